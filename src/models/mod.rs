pub mod alert;
pub mod forecast;
pub mod parcel;
pub mod reading;

pub use alert::*;
pub use forecast::*;
pub use parcel::*;
pub use reading::*;
