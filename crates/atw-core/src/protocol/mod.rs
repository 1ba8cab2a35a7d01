//! Protocol module containing the payload cipher, the envelope codec, and the
//! typed inner payloads.

pub mod crypto;
pub mod envelope;
pub mod payload;

pub use crypto::{decrypt, encrypt, CryptoError, GENERIC_KEY};
pub use envelope::{open, scan_datagram, seal, Envelope, EnvelopeError};
pub use payload::{classify, InboundPayload, PayloadError};
