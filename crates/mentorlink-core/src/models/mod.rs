//! Data models for the mentorlink backend.
//!
//! - `LoginCredentials`, `Registration`: request bodies for the auth endpoints
//! - `AuthResponse`, `RefreshResponse`, `User`: what those endpoints return
//! - `Mentee`, `Meeting`, `PrayerRequest`: the protected resources

pub mod auth;
pub mod mentee;

pub use auth::{AuthResponse, LoginCredentials, RefreshResponse, Registration, User, ValidationError};
pub use mentee::{
    Meeting, MeetingStatus, MeetingUpdate, Mentee, MenteeUpdate, NewMeeting, NewPrayerRequest,
    PrayerRequest, PrayerRequestUpdate, UnavailableTimes,
};
