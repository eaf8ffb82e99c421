//! Deferring work to the next turn of the event loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;
use tokio::sync::Notify;
use tokio::task::{spawn_local, JoinHandle};

/// A piece of deferred work.
pub(crate) type Job = Box<dyn FnOnce()>;

//------------ TickQueue -----------------------------------------------------

/// A queue of jobs run by a local task.
///
/// Jobs are never run by [`push`][Self::push] itself but only once the
/// event loop gets around to the draining task. All jobs queued by then
/// are run in order.
#[derive(Default)]
pub(crate) struct TickQueue {
    jobs: Rc<RefCell<VecDeque<Job>>>,
    notify: Rc<Notify>,
    drainer: RefCell<Option<JoinHandle<()>>>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a job.
    ///
    /// Spawns the draining task on first use, so this must be called from
    /// within a [`LocalSet`](tokio::task::LocalSet).
    pub fn push(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
        let mut drainer = self.drainer.borrow_mut();
        if drainer.is_none() {
            *drainer = Some(spawn_local(drain(
                self.jobs.clone(),
                self.notify.clone(),
            )));
        }
        self.notify.notify_one();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }
}

impl Drop for TickQueue {
    fn drop(&mut self) {
        if let Some(drainer) = self.drainer.get_mut().take() {
            drainer.abort();
        }
    }
}

async fn drain(jobs: Rc<RefCell<VecDeque<Job>>>, notify: Rc<Notify>) {
    loop {
        notify.notified().await;
        let batch = mem::take(&mut *jobs.borrow_mut());
        for job in batch {
            job();
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;
    use tokio::task::{yield_now, LocalSet};

    #[tokio::test]
    async fn runs_later_in_order() {
        LocalSet::new()
            .run_until(async {
                let queue = TickQueue::new();
                let seen = Rc::new(RefCell::new(Vec::new()));
                for i in 0..3 {
                    let seen = seen.clone();
                    queue.push(Box::new(move || seen.borrow_mut().push(i)));
                }
                assert!(seen.borrow().is_empty());
                assert_eq!(queue.len(), 3);

                yield_now().await;
                assert_eq!(*seen.borrow(), vec![0, 1, 2]);
                assert_eq!(queue.len(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn job_pushed_by_job_is_deferred() {
        LocalSet::new()
            .run_until(async {
                let queue = Rc::new(TickQueue::new());
                let count = Rc::new(Cell::new(0));
                let inner_queue = queue.clone();
                let inner_count = count.clone();
                queue.push(Box::new(move || {
                    inner_count.set(inner_count.get() + 1);
                    let count = inner_count.clone();
                    inner_queue
                        .push(Box::new(move || count.set(count.get() + 10)));
                    assert_eq!(inner_count.get(), 1);
                }));
                assert_eq!(count.get(), 0);
                yield_now().await;
                assert_eq!(count.get(), 11);
            })
            .await;
    }
}
