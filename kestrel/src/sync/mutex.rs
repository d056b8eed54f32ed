use std::cell::{Cell, RefCell, UnsafeCell};
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// An asynchronous mutex for tasks on one event loop.
///
/// Waiters acquire the lock in the order they first asked for it. On release
/// the lock is handed directly to the next waiter, so a task that was not
/// waiting cannot barge in ahead of it.
pub struct Mutex<T> {
    locked: Cell<bool>,
    waiters: RefCell<VecDeque<Rc<Waiter>>>,
    data: UnsafeCell<T>,
}

struct Waiter {
    granted: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Mutex<T> {
        Self {
            locked: Cell::new(false),
            waiters: RefCell::new(VecDeque::new()),
            data: UnsafeCell::new(value),
        }
    }

    /// Resolves to a guard once the lock is held by the calling task.
    pub fn lock(&self) -> Lock<'_, T> {
        Lock {
            mutex: self,
            waiter: None,
        }
    }

    /// Acquires the lock if it is free and nobody is queued for it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self.locked.get() {
            return None;
        }

        self.locked.set(true);
        Some(MutexGuard { mutex: self })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Passes the lock to the oldest waiter, or frees it.
    fn unlock(&self) {
        let next = self.waiters.borrow_mut().pop_front();

        match next {
            Some(waiter) => {
                waiter.granted.set(true);
                let waker = waiter.waker.borrow_mut().take();
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            None => self.locked.set(false),
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Mutex::new(T::default())
    }
}

/// Future returned by [`Mutex::lock`].
#[must_use = "futures do nothing unless polled"]
pub struct Lock<'a, T> {
    mutex: &'a Mutex<T>,
    waiter: Option<Rc<Waiter>>,
}

impl<'a, T> Future for Lock<'a, T> {
    type Output = MutexGuard<'a, T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mutex = self.mutex;

        if let Some(waiter) = &self.waiter {
            if waiter.granted.get() {
                self.waiter = None;
                return Poll::Ready(MutexGuard { mutex });
            }

            *waiter.waker.borrow_mut() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        if !mutex.locked.get() {
            mutex.locked.set(true);
            return Poll::Ready(MutexGuard { mutex });
        }

        let waiter = Rc::new(Waiter {
            granted: Cell::new(false),
            waker: RefCell::new(Some(cx.waker().clone())),
        });
        mutex.waiters.borrow_mut().push_back(waiter.clone());
        self.waiter = Some(waiter);

        Poll::Pending
    }
}

impl<T> Drop for Lock<'_, T> {
    fn drop(&mut self) {
        let Some(waiter) = self.waiter.take() else {
            return;
        };

        if waiter.granted.get() {
            // Handed the lock but never took it.
            self.mutex.unlock();
        } else {
            self.mutex
                .waiters
                .borrow_mut()
                .retain(|queued| !Rc::ptr_eq(queued, &waiter));
        }
    }
}

/// Releases the lock when dropped.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.mutex.data.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task;
    use crate::testing::serial;

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new(1);

        let guard = mutex.try_lock();
        assert!(guard.is_some());
        assert!(mutex.try_lock().is_none());

        drop(guard);
        assert!(mutex.try_lock().is_some());
    }

    #[test]
    fn waiters_acquire_in_arrival_order() {
        let _serial = serial();

        let order = crate::block_on(async {
            let mutex = Rc::new(Mutex::new(Vec::new()));
            let guard = mutex.lock().await;

            let handles: Vec<_> = (0..3)
                .map(|i| {
                    let mutex = mutex.clone();
                    task::spawn(async move {
                        mutex.lock().await.push(i);
                    })
                })
                .collect();

            crate::yield_now().await;
            drop(guard);

            for handle in handles {
                handle.await.unwrap();
            }

            let order = mutex.lock().await.clone();
            order
        });

        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn dropped_lock_future_leaves_the_queue() {
        let _serial = serial();

        let acquired = crate::block_on(async {
            let mutex = Rc::new(Mutex::new(0));
            let guard = mutex.lock().await;

            let abandoned = {
                let mutex = mutex.clone();
                task::spawn(async move {
                    let _ = crate::time::timeout(
                        std::time::Duration::from_millis(1),
                        mutex.lock(),
                    )
                    .await;
                })
            };
            abandoned.await.unwrap();

            drop(guard);
            mutex.try_lock().is_some()
        });

        assert!(acquired);
    }
}
