pub mod crtc6845;
pub mod mc146818;
pub mod saa5050;
pub mod sn76489;
pub mod via6522;
pub mod video_ula;
pub mod wd1770;

pub use crtc6845::{Crtc6845, CrtcOutput};
pub use mc146818::{Mc146818, RtcTime};
pub use saa5050::Saa5050;
pub use sn76489::Sn76489;
pub use via6522::Via6522;
pub use video_ula::VideoUla;
pub use wd1770::{FdcHandler, FdcOutput, Wd1770};
