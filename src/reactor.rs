use crate::action::{Action, ActionId, ActionRegistry};
use crate::error::Error;
use crate::time::{Interval, Time};
use crate::timer::{NowFn, Timer, TimerQueue};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use tracing::{debug, trace};

#[derive(Copy, Clone, PartialEq, Eq)]
enum RunState {
    Created,
    Running,
    Stopped,
}

struct Shared {
    state: Cell<RunState>,
    quit: Cell<bool>,
    clock: NowFn,
    registry: RefCell<ActionRegistry>,
    timers: RefCell<TimerQueue>,
    table: RefCell<HashMap<RawFd, ActionId>>,
    interest: RefCell<Vec<libc::pollfd>>,
}

/// Single-threaded event loop merging descriptor readiness with timer
/// expiry into one blocking `poll(2)` wait.
///
/// The handle is cheap to clone; callbacks typically capture a clone and
/// call [`quit`](Reactor::quit) or the registration methods from inside a
/// firing action. All state is confined to the loop thread; nothing here is
/// `Send`.
#[derive(Clone)]
pub struct Reactor {
    shared: Rc<Shared>,
}

impl Reactor {
    pub fn new() -> Reactor {
        Reactor::with_clock(Rc::new(Time::now))
    }

    pub fn with_clock(clock: NowFn) -> Reactor {
        Reactor {
            shared: Rc::new(Shared {
                state: Cell::new(RunState::Created),
                quit: Cell::new(false),
                clock: clock.clone(),
                registry: RefCell::new(ActionRegistry::new()),
                timers: RefCell::new(TimerQueue::with_clock(clock)),
                table: RefCell::new(HashMap::new()),
                interest: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The loop's view of the current time.
    pub fn now(&self) -> Time {
        (self.shared.clock)()
    }

    /// Registers `source` for read-interest and binds a registry-owned clone
    /// of `action` as its handler. Re-registering the same descriptor
    /// replaces the binding and releases the previous clone.
    pub fn register_descriptor<S: AsRawFd>(&self, source: &S, action: &dyn Action) {
        let fd = source.as_raw_fd();
        let id = self.shared.registry.borrow_mut().reproduce(action);

        match self.shared.table.borrow_mut().insert(fd, id) {
            Some(previous) => self.shared.registry.borrow_mut().remove(previous),
            None => self.shared.interest.borrow_mut().push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            }),
        }

        debug!(fd, "descriptor registered");
    }

    /// Drops the interest, handler binding and registry clone for `source`.
    /// A no-op for an unregistered descriptor.
    pub fn deregister_descriptor<S: AsRawFd>(&self, source: &S) {
        let fd = source.as_raw_fd();
        if let Some(id) = self.shared.table.borrow_mut().remove(&fd) {
            self.shared.registry.borrow_mut().remove(id);
            self.shared.interest.borrow_mut().retain(|pfd| pfd.fd != fd);
            debug!(fd, "descriptor deregistered");
        }
    }

    /// Schedules `timer`, binding a registry-owned clone of `action`.
    pub fn register_timer(&self, timer: Timer, action: &dyn Action) {
        let mut registry = self.shared.registry.borrow_mut();
        self.shared
            .timers
            .borrow_mut()
            .add(&mut registry, timer, action);
    }

    /// Requests the loop to stop. Takes effect once the current harvest or
    /// dispatch batch completes; never preemptive. Calling this before
    /// [`run`](Reactor::run) makes `run` return after zero iterations.
    pub fn quit(&self) {
        self.shared.quit.set(true);
    }

    /// Runs the loop until [`quit`](Reactor::quit) is observed.
    ///
    /// Not reentrant and not restartable: a second call fails, and a fresh
    /// `Reactor` is required to run again.
    pub fn run(&self) -> Result<(), Error> {
        match self.shared.state.get() {
            RunState::Created => self.shared.state.set(RunState::Running),
            RunState::Running => return Err(Error::Running),
            RunState::Stopped => return Err(Error::Finished),
        }

        while !self.shared.quit.get() {
            let timeout = poll_timeout(self.harvest());
            if self.shared.quit.get() {
                break;
            }

            let ret = {
                let mut interest = self.shared.interest.borrow_mut();
                trace!(descriptors = interest.len(), timeout, "blocking");
                unsafe {
                    libc::poll(
                        interest.as_mut_ptr(),
                        interest.len() as libc::nfds_t,
                        timeout,
                    )
                }
            };

            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                self.shared.state.set(RunState::Stopped);
                return Err(Error::Poll(err));
            }

            if ret == 0 {
                continue;
            }

            // Snapshot the ready set before dispatching: handlers may mutate
            // the interest list, and a descriptor deregistered mid-batch is
            // skipped by the per-descriptor table lookup below.
            let ready: Vec<RawFd> = {
                let mut interest = self.shared.interest.borrow_mut();
                interest
                    .iter_mut()
                    .filter(|pfd| pfd.revents != 0)
                    .map(|pfd| {
                        pfd.revents = 0;
                        pfd.fd
                    })
                    .collect()
            };

            for fd in ready {
                let id = self.shared.table.borrow().get(&fd).copied();
                match id {
                    Some(id) => self.invoke(id),
                    None => trace!(fd, "readiness for unregistered descriptor ignored"),
                }
            }
        }

        self.shared.state.set(RunState::Stopped);
        Ok(())
    }

    /// Fires every due timer, one deadline at a time in ascending order, and
    /// reports the wait until the next one (`None` = wait indefinitely).
    fn harvest(&self) -> Option<Interval> {
        loop {
            let due = self.shared.timers.borrow_mut().pop_due();
            match due {
                Some((mut timer, id)) => {
                    self.invoke(id);
                    if timer.is_one_shot() {
                        self.shared.registry.borrow_mut().remove(id);
                    } else {
                        timer.advance();
                        self.shared.timers.borrow_mut().push(timer, id);
                    }
                }
                None => return self.shared.timers.borrow().remaining(),
            }
        }
    }

    // No borrow is held while the action runs, so the action is free to call
    // back into registration, deregistration or quit.
    fn invoke(&self, id: ActionId) {
        let action = self.shared.registry.borrow_mut().take(id);
        if let Some(mut action) = action {
            action.perform();
            self.shared.registry.borrow_mut().restore(id, action);
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Reactor::new()
    }
}

fn poll_timeout(remaining: Option<Interval>) -> libc::c_int {
    match remaining {
        None => -1,
        Some(interval) => interval
            .as_millis_ceil()
            .min(libc::c_int::MAX as i64) as libc::c_int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_conversion() {
        assert_eq!(poll_timeout(None), -1);
        assert_eq!(poll_timeout(Some(Interval::ZERO)), 0);
        assert_eq!(poll_timeout(Some(Interval::from_raw(-3))), 0);
        assert_eq!(poll_timeout(Some(Interval::from_millis(250))), 250);
        assert_eq!(
            poll_timeout(Some(Interval::from_secs(i64::MAX >> 33))),
            libc::c_int::MAX
        );
    }
}
