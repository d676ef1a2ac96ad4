pub mod windows;

pub use windows::AvailabilityService;
