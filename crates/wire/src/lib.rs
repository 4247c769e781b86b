pub mod frame;

pub use frame::{read_message, send_envelope, write_frame, ReadOutcome, MAX_FRAME_BYTES};
