use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::session::MapCommand;
use crate::speech::{SpeechError, SpeechOutput, Utterance};

/// Commands waiting to be picked up by the browser.
#[derive(Debug, Default)]
pub struct Outbox {
    commands: Vec<MapCommand>,
}

impl Outbox {
    pub fn push(&mut self, command: MapCommand) {
        self.commands.push(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = MapCommand>) {
        self.commands.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn drain(&mut self) -> Vec<MapCommand> {
        std::mem::take(&mut self.commands)
    }

    fn drop_pending_speech(&mut self) {
        self.commands
            .retain(|command| !matches!(command, MapCommand::Speak { .. }));
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicked handler leaves the queue in a usable state
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Speech for a browser client: utterances are queued as `Speak` commands
/// and the browser's synthesizer plays them. Only the newest utterance
/// survives until the next poll.
pub struct OutboxSpeech {
    outbox: Arc<Mutex<Outbox>>,
}

impl OutboxSpeech {
    pub fn new(outbox: Arc<Mutex<Outbox>>) -> Self {
        OutboxSpeech { outbox }
    }
}

impl SpeechOutput for OutboxSpeech {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        let mut outbox = lock(&self.outbox);
        outbox.drop_pending_speech();
        outbox.push(MapCommand::Speak { utterance });
        Ok(())
    }

    fn cancel(&mut self) {
        let mut outbox = lock(&self.outbox);
        outbox.drop_pending_speech();
        outbox.push(MapCommand::CancelSpeech);
    }
}
