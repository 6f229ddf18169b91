//! Input types
//!
//! The engine does no decoding of its own; collaborators hand it a
//! [`PcmBuffer`] of already-decoded, channel-normalized samples.

pub mod pcm;

pub use pcm::PcmBuffer;
