use tracing::info;

use super::Prospect;
use crate::bus::Event;
use crate::store::{ObjectStore, PutOutcome};
use crate::worker::{HandlerError, MessageHandler};

/// Renders a prospect sheet for every published model design.
///
/// The sheet's object key depends only on the prospect. If an object is
/// already stored under that key, the event is a redelivery (or a
/// republished model) and is reported as a duplicate effect without
/// rendering again.
pub struct ProspectGenerator<O> {
    objects: O,
}

impl<O: ObjectStore> ProspectGenerator<O> {
    pub fn new(objects: O) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }
}

impl<O: ObjectStore> MessageHandler for ProspectGenerator<O> {
    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let prospect: Prospect = event.decode()?;
        prospect.validate().map_err(HandlerError::PoisonMessage)?;

        let key = prospect.document_key();
        if self.objects.contains_object(&key)? {
            return Err(HandlerError::DuplicateEffect(key));
        }

        let sheet = prospect
            .render_sheet()
            .map_err(|e| HandlerError::PoisonMessage(format!("render {key}: {e}")))?;

        match self.objects.put_object(&key, sheet)? {
            PutOutcome::Unchanged => Err(HandlerError::DuplicateEffect(key)),
            PutOutcome::Created | PutOutcome::Overwritten => {
                info!(key = %key, name = %prospect.name, "prospect sheet written");
                Ok(())
            }
        }
    }
}
