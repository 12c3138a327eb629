pub mod dose;
pub mod enums;
pub mod medication;
pub mod notification;
pub mod settings;

pub use dose::*;
pub use medication::*;
pub use notification::*;
pub use settings::*;
