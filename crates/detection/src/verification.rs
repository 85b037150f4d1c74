//! Disposal confirmation channel.
//!
//! The component that confirms a disposal holds the sender; the detection
//! engine polls the receiver while holding. Confirmation is sticky: once
//! sent it stays confirmed for the lifetime of the channel, including for
//! receivers subscribed after the fact.

use tokio::sync::watch;

/// Create a fresh, unconfirmed channel.
pub fn verification_channel() -> (VerificationSender, VerificationReceiver) {
    let (tx, rx) = watch::channel(false);
    (VerificationSender(tx), VerificationReceiver(rx))
}

#[derive(Debug)]
pub struct VerificationSender(watch::Sender<bool>);

impl VerificationSender {
    /// Confirm the disposal. Returns `true` only the first time.
    pub fn confirm(&self) -> bool {
        self.0.send_if_modified(|confirmed| {
            if *confirmed {
                false
            } else {
                *confirmed = true;
                true
            }
        })
    }

    /// A receiver that sees the current state, confirmed or not.
    pub fn subscribe(&self) -> VerificationReceiver {
        VerificationReceiver(self.0.subscribe())
    }
}

#[derive(Debug, Clone)]
pub struct VerificationReceiver(watch::Receiver<bool>);

impl VerificationReceiver {
    pub fn is_confirmed(&self) -> bool {
        *self.0.borrow()
    }
}
