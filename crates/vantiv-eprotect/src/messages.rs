//! Payer-facing messages for tokenization failures

/// Shown for processor-side failures and unknown codes
pub const TECHNICAL_DIFFICULTY: &str =
    "We are experiencing technical difficulties. Please try again later.";

/// Shown when the round trip exceeds its deadline
pub const TECHNICAL_DIFFICULTY_TIMEOUT: &str =
    "We are experiencing technical difficulties (timeout). Please try again later.";

/// Message for a tokenization error code
pub fn error_message(code: &str) -> &'static str {
    match code {
        "871" => "Invalid card number. Check and retry. (Not Mod10)",
        "872" => "Invalid card number. Check and retry. (Too short)",
        "873" => "Invalid card number. Check and retry. (Too long)",
        "874" => "Invalid card number. Check and retry. (Not a number)",
        "876" => "Invalid card number. Check and retry. (Failure from Server)",
        "881" => "Invalid card validation code. Check and retry. (Not a number)",
        "882" => "Invalid card validation code. Check and retry. (Too short)",
        "883" => "Invalid card validation code. Check and retry. (Too long)",
        _ => TECHNICAL_DIFFICULTY,
    }
}
