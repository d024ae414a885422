//! # Frame extraction
//!
//! A metadata frame rides inside the sample stream:
//!
//! ```text
//! ┌──────────────────┬───────────┬──────────────┬───────┬──────────────────┐
//! │ SENTINEL × 16383+│ frequency │ mean × 16384 │ count │ count × 4 fields │
//! └──────────────────┴───────────┴──────────────┴───────┴──────────────────┘
//! ```
//!
//! | Module       | Purpose                                          |
//! |--------------|--------------------------------------------------|
//! | `types`      | `Frame`, `ChannelEntry` and protocol constants   |
//! | `milestones` | Per-call event set reported by the extractor     |
//! | `extractor`  | The state machine shared by the tap and the sink |
//! | `encode`     | Writes a frame out in stream layout              |

pub mod encode;
pub mod extractor;
pub mod milestones;
pub mod types;

pub use encode::{encode_frame, encoded_len};
pub use extractor::{ExtractorState, FrameExtractor, Step};
pub use milestones::Milestones;
pub use types::{
    CHANNEL_FIELDS, ChannelEntry, ChannelField, Frame, MEAN_VECTOR_LEN, PREAMBLE_LEN, SENTINEL,
    Sample,
};
