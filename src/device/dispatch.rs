// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Blocking hand-off of work to the main thread.
//!
//! Some mixers only allow resources to be created and destroyed on the thread that
//! opened the device. Calls from that thread run inline. Calls from any other thread
//! are queued and the caller blocks until the main thread drains the queue with
//! [`MainThreadDispatcher::pump`].

use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

type Job = Box<dyn FnOnce() + Send>;

pub struct MainThreadDispatcher {
    /// The thread that owns the device.
    main: ThreadId,
    /// Taken on close, after which every call runs inline on the calling thread.
    tx: Mutex<Option<Sender<Job>>>,
    rx: Receiver<Job>,
}

impl MainThreadDispatcher {
    /// Creates a dispatcher owned by the calling thread.
    pub fn new() -> MainThreadDispatcher {
        let (tx, rx) = crossbeam_channel::unbounded();
        MainThreadDispatcher {
            main: thread::current().id(),
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Returns true when called from the owning thread.
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main
    }

    /// Runs `f` on the main thread and returns its result.
    ///
    /// Returns `None` only if the job panicked before producing a result.
    pub fn run<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            return Some(f());
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let _ = done_tx.send(f());
        });
        // Sending under the lock means a job is either queued before close drains
        // the queue or sees the dispatcher closed.
        let rejected = match self.tx.lock().as_ref() {
            Some(tx) => tx.send(job).err().map(|err| err.into_inner()),
            None => Some(job),
        };
        if let Some(job) = rejected {
            job();
        }
        done_rx.recv().ok()
    }

    /// Executes every queued job. Does nothing off the main thread.
    pub fn pump(&self) -> usize {
        if !self.is_main_thread() {
            return 0;
        }
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            executed += 1;
        }
        if executed > 0 {
            trace!(executed, "Executed main thread jobs");
        }
        executed
    }

    /// Locks `mutex`, pumping queued jobs while waiting when on the main thread.
    ///
    /// A thread that holds a lock and is blocked in [`MainThreadDispatcher::run`] can
    /// only make progress once the main thread pumps, so the main thread must never
    /// block on such a lock without pumping.
    pub fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        if !self.is_main_thread() {
            return mutex.lock();
        }
        loop {
            if let Some(guard) = mutex.try_lock_for(Duration::from_millis(1)) {
                return guard;
            }
            self.pump();
        }
    }

    /// Stops routing work to the main thread and runs anything still queued.
    pub fn close(&self) {
        self.tx.lock().take();
        while let Ok(job) = self.rx.try_recv() {
            job();
        }
    }
}

impl Default for MainThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
