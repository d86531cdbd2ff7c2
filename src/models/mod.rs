mod user;
mod video;

pub use user::{
    normalize_country, validate_time_interval, CountryParams, LoginRequest, NewUser,
    TimeIntervalParams, UserRecord, UserResponse,
};
pub use video::VideoMessage;
