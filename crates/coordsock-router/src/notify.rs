//! Error notifications back to the originating client

use coordsock_core::codec;
use coordsock_transport::TransportSender;
use tracing::{debug, error};

/// Serialize `{"error": text}` and queue it on `sender`.
///
/// Never fails: a connection that cannot take the notification is already on
/// its way out, and its own receive loop will notice.
pub async fn notify(sender: &dyn TransportSender, text: &str) {
    let payload = match codec::encode_error(text) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to encode error payload: {}", e);
            return;
        }
    };

    if let Err(e) = sender.send(payload).await {
        debug!("Error notification not delivered ({}): {}", text, e);
    }
}
