pub mod color;
pub mod compositing;
pub mod contours;
pub mod flood_fill;
pub mod morphology;

pub use color::*;
pub use compositing::*;
pub use contours::*;
pub use flood_fill::*;
pub use morphology::*;
