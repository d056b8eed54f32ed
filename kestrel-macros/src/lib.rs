//! Attribute macros for Kestrel entry points and tests.

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs an `async fn main` on a fresh Kestrel event loop.
///
/// Accepts an optional `worker_threads = N` argument that sizes the worker
/// pool.
///
/// ```rust,ignore
/// #[kestrel::main(worker_threads = 4)]
/// async fn main() {
///     kestrel::time::sleep(std::time::Duration::from_millis(1)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_str = attr.to_string();
    let mut worker_threads: Option<usize> = None;

    for part in attr_str.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some(value) = part.strip_prefix("worker_threads") else {
            return compile_error(&format!("unknown argument `{part}`"));
        };

        match value.trim_start().trim_start_matches('=').trim().parse::<usize>() {
            Ok(n) if n > 0 => worker_threads = Some(n),
            _ => return compile_error("`worker_threads` must be a positive integer"),
        }
    }

    let mut builder = String::from("::kestrel::RuntimeBuilder::new()");
    if let Some(n) = worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }

    rewrite(item, &builder, "")
}

/// Runs an `async fn` test on a fresh Kestrel event loop.
///
/// Tests that create a loop are serialized, since only one loop may exist per
/// process.
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let rewritten = rewrite(
        item,
        "::kestrel::RuntimeBuilder::new()",
        "let _serial = ::kestrel::testing::serial();",
    );

    let mut result: TokenStream = "#[::core::prelude::v1::test]"
        .parse()
        .unwrap_or_default();
    result.extend(rewritten);
    result
}

/// Strips `async` from the signature and wraps the body in
/// `builder.block_on(async move { body })`, preceded by `prelude`.
fn rewrite(item: TokenStream, builder: &str, prelude: &str) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some(body_pos) = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
    else {
        return compile_error("expected a function body");
    };

    let Some(async_pos) = tokens[..body_pos]
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    else {
        return compile_error("the function must be `async`");
    };

    let body = match &tokens[body_pos] {
        TokenTree::Group(g) => g.stream(),
        _ => return compile_error("expected a function body"),
    };

    let mut future: TokenStream = "async move".parse().unwrap_or_default();
    future.extend([TokenTree::Group(Group::new(Delimiter::Brace, body))]);

    let mut block: TokenStream = format!("{prelude} {builder}.block_on")
        .parse()
        .unwrap_or_default();
    block.extend([TokenTree::Group(Group::new(Delimiter::Parenthesis, future))]);

    tokens[body_pos] = TokenTree::Group(Group::new(Delimiter::Brace, block));
    tokens.remove(async_pos);

    tokens.into_iter().collect()
}

fn compile_error(message: &str) -> TokenStream {
    format!("::core::compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
