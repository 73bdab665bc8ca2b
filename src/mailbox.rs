//! Capacity-1 coalescing signal channels.
//!
//! A mailbox carries intent, not data: raising it while a signal is already
//! pending is a no-op, so bursts of identical requests collapse into one.

use tokio::sync::mpsc;

/// Sending half of a coalescing signal channel.
#[derive(Debug, Clone)]
pub struct Mailbox(mpsc::Sender<()>);

/// Create a mailbox and its receiving half.
pub fn mailbox() -> (Mailbox, mpsc::Receiver<()>) {
	let (tx, rx) = mpsc::channel(1);
	(Mailbox(tx), rx)
}

impl Mailbox {
	/// Raise the signal, dropping it if one is already pending.
	pub fn raise(&self) {
		self.0.try_send(()).ok();
	}
}
