use std::sync::Arc;

use futures_lite::{
    FutureExt,
    future::{self, Boxed},
};
use log::{debug, info, warn};

use crate::{
    ProgressAck,
    engine::{EngineShared, scheduler::DebounceScheduler, status::WritePhase},
    error::ProgressError,
};

pub(crate) type FlushResponse = async_oneshot::Sender<Result<(), ProgressError>>;

/// A command sent from a [crate::ProgressEngine] handle to its write actor.
pub(crate) enum EngineCommand {
    /// The current page has been updated, a write should be scheduled.
    PageChanged,
    /// Run the scheduled write now and report its outcome.
    Flush(FlushResponse),
    Detach(async_oneshot::Sender<()>),
}

/// Owns the debounce timer and the in-flight write of one engine.
///
/// All writes of an engine go through this actor, so at most one write is scheduled or running
/// at any time.
pub(crate) struct WriteActor {
    state: WriteActorState,
    commands: async_channel::Receiver<EngineCommand>,
    shared: Arc<EngineShared>,
    scheduler: DebounceScheduler,
}

impl WriteActor {
    pub fn new(
        shared: Arc<EngineShared>,
        commands: async_channel::Receiver<EngineCommand>,
        scheduler: DebounceScheduler,
    ) -> Self {
        Self {
            state: WriteActorState::Idle,
            commands,
            shared,
            scheduler,
        }
    }

    pub async fn run(&mut self) {
        while !self.state.is_stopped() {
            self.handle_event().await;
        }
    }

    async fn handle_event(&mut self) {
        enum ActorEvent {
            Command(Option<EngineCommand>),
            TimerFired,
            WriteCompleted(Result<ProgressAck, ProgressError>),
        }

        let event = {
            let commands = &self.commands;
            // Commands are polled first so that a detach wins against a timer firing at the
            // same time.
            let next_command = async { ActorEvent::Command(commands.recv().await.ok()) };

            match &mut self.state {
                WriteActorState::Writing(write) => {
                    let result = &mut write.result;
                    let completed = async { ActorEvent::WriteCompleted(result.await) };
                    future::race(next_command, completed).await
                }
                _ => {
                    let scheduler = &mut self.scheduler;
                    let fired = async {
                        scheduler.fired().await;
                        ActorEvent::TimerFired
                    };
                    future::race(next_command, fired).await
                }
            }
        };

        match event {
            ActorEvent::Command(None) => {
                // All engine handles have been dropped.
                self.stop();
            }
            ActorEvent::Command(Some(EngineCommand::PageChanged)) => self.handle_page_changed(),
            ActorEvent::Command(Some(EngineCommand::Flush(response))) => {
                self.handle_flush(response)
            }
            ActorEvent::Command(Some(EngineCommand::Detach(mut response))) => {
                self.stop();
                let _ = response.send(());
            }
            ActorEvent::TimerFired => {
                if self.shared.is_attached() {
                    self.start_write(Vec::new());
                } else {
                    self.stop();
                }
            }
            ActorEvent::WriteCompleted(result) => {
                let previous = std::mem::replace(&mut self.state, WriteActorState::Idle);
                if let WriteActorState::Writing(write) = previous {
                    self.finish_write(write, result);
                }
            }
        }
    }

    fn handle_page_changed(&mut self) {
        match &mut self.state {
            WriteActorState::Writing(write) => {
                // Writes are serialized, the new page is picked up once this one completes.
                write.edited = true;
            }
            WriteActorState::Stopped => {}
            WriteActorState::Idle | WriteActorState::Scheduled => self.schedule(),
        }
    }

    fn handle_flush(&mut self, mut response: FlushResponse) {
        match &mut self.state {
            WriteActorState::Writing(write) => write.flushes.push(response),
            WriteActorState::Scheduled => {
                if self.scheduler.cancel_and_run() {
                    debug!("Flushing scheduled progress write");
                }
                self.start_write(vec![response]);
            }
            WriteActorState::Idle => {
                let _ = response.send(Ok(()));
            }
            WriteActorState::Stopped => {
                let _ = response.send(Err(ProgressError::detached()));
            }
        }
    }

    fn schedule(&mut self) {
        self.scheduler.schedule();
        self.state = WriteActorState::Scheduled;
        self.shared
            .status
            .update(|s| s.set_phase(WritePhase::Scheduled));
    }

    fn start_write(&mut self, flushes: Vec<FlushResponse>) {
        // The page is read when the write starts rather than when it was scheduled, so a burst of
        // changes results in a single write of the final page.
        let page = self.shared.status.update(|s| {
            s.set_phase(WritePhase::Writing);
            s.current_page()
        });

        let shared = self.shared.clone();
        self.state = WriteActorState::Writing(RunningWrite {
            result: async move { shared.sync_page(page).await }.boxed(),
            edited: false,
            flushes,
        });
    }

    fn finish_write(&mut self, write: RunningWrite, result: Result<ProgressAck, ProgressError>) {
        let RunningWrite {
            edited, flushes, ..
        } = write;

        let completed = match &result {
            Ok(ack) => {
                info!("Reading service confirmed page {} of {}", ack.page, self.shared.book_id);
                self.shared.status.update(|s| {
                    s.clear_write_error();
                    s.set_phase(WritePhase::Idle);
                    s.state_mut().acknowledge(ack.page)
                })
            }
            Err(e) => {
                warn!("Could not write progress of {}: {e}", self.shared.book_id);
                self.shared.status.update(|s| {
                    s.set_write_error(e.clone());
                    s.set_phase(WritePhase::Idle);
                });
                false
            }
        };

        if completed {
            self.shared.notify_completed();
        }

        if edited && !flushes.is_empty() {
            // Flushing callers expect the page the reader ended up on to be written, not the one
            // that was current when this write started.
            self.start_write(flushes);
            return;
        }

        let outcome = result.map(|_| ());
        for mut flush in flushes {
            let _ = flush.send(outcome.clone());
        }

        if edited {
            self.schedule();
        }
    }

    fn stop(&mut self) {
        self.scheduler.cancel();

        let previous = std::mem::replace(&mut self.state, WriteActorState::Stopped);
        if let WriteActorState::Writing(write) = previous {
            debug!("Abandoning in-flight progress write of {}", self.shared.book_id);
            for mut flush in write.flushes {
                let _ = flush.send(Err(ProgressError::detached()));
            }
        }

        self.shared.mark_detached();
    }
}

enum WriteActorState {
    Idle,
    Scheduled,
    Writing(RunningWrite),
    Stopped,
}

impl WriteActorState {
    fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

struct RunningWrite {
    result: Boxed<Result<ProgressAck, ProgressError>>,
    /// Whether the page changed after this write started.
    edited: bool,
    /// [crate::ProgressEngine::flush] calls waiting for this write.
    flushes: Vec<FlushResponse>,
}
