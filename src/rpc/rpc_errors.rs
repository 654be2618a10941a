use solana_client::client_error::ClientError;
use solana_rpc_client_api::client_error::ErrorKind;
use solana_sdk::transaction::TransactionError;

use crate::retry::is_rate_limit_message;
use crate::tx_builder::errors::BridgeError;

const ALREADY_PROCESSED_PATTERNS: [&str; 3] = [
    "already been processed",
    "already processed",
    "alreadyprocessed",
];

/// Map a Solana client error into the crate taxonomy
pub fn classify_client_error(err: ClientError, endpoint: &str) -> BridgeError {
    match err.kind() {
        ErrorKind::TransactionError(TransactionError::AlreadyProcessed) => {
            BridgeError::remote(endpoint, "transaction already processed")
        }
        ErrorKind::Reqwest(inner) => match inner.status() {
            Some(status) => BridgeError::remote_status(endpoint, status.as_u16(), err.to_string()),
            None => classify_message(&err.to_string(), endpoint),
        },
        _ => classify_message(&err.to_string(), endpoint),
    }
}

pub(crate) fn classify_message(message: &str, endpoint: &str) -> BridgeError {
    let lower = message.to_lowercase();

    if is_rate_limit_message(&lower) {
        BridgeError::remote_status(endpoint, 429, message)
    } else if let Some(code) = extract_http_status(&lower) {
        BridgeError::remote_status(endpoint, code, message)
    } else {
        BridgeError::remote(endpoint, message)
    }
}

/// Whether a broadcast failure means the same transaction already landed
pub fn is_already_processed(err: &BridgeError) -> bool {
    match err {
        BridgeError::RemoteCall { message, .. } => {
            let lower = message.to_lowercase();
            ALREADY_PROCESSED_PATTERNS.iter().any(|p| lower.contains(p))
        }
        _ => false,
    }
}

fn extract_http_status(lower: &str) -> Option<u16> {
    lower
        .split("status code")
        .nth(1)
        .or_else(|| lower.split("http status").nth(1))
        .and_then(|rest| {
            rest.split(|c: char| !c.is_ascii_digit())
                .find(|s| s.len() == 3)
        })
        .and_then(|s| s.parse::<u16>().ok())
}
