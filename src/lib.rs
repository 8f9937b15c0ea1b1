//! Client library for the TUSUR university web services.
//!
//! One portal brand, four independently served systems:
//!
//! - the profile portal (`profile.tusur.ru`) runs the sign-in and issues
//!   the session cookie;
//! - the SDO learning system (`sdo.tusur.ru`, Moodle) accepts that session
//!   through a delegated login and serves notifications, conversations,
//!   course rosters and user profiles;
//! - the timetable (`timetable.tusur.ru`) and grades (`ocenka.tusur.ru`)
//!   systems are public and need no authentication at all.
//!
//! ```no_run
//! use tusur::{Authenticator, Credentials, Messaging, TimetableClient};
//!
//! # async fn run() -> tusur::Result<()> {
//! let auth = Authenticator::login(Credentials::new("user@example.com", "secret")).await?;
//! let notifications = Messaging::new(&auth).notifications().await?;
//! println!("{} unread envelopes", notifications.len());
//!
//! let week = TimetableClient::new()?.get_timetable("571-2", None).await?;
//! for day in &week {
//!     println!("{}: {} slots", day.day, day.lessons.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod directory;
pub mod endpoints;
pub mod error;
pub mod grades;
pub mod messaging;
pub mod rpc;
pub mod session;
pub mod text;
pub mod timetable;

pub use auth::{extract_context_id, extract_sesskey, Authenticator, Credentials};
pub use directory::{Directory, Participant, RosterQuery, UserProfile};
pub use endpoints::Endpoints;
pub use error::{Error, Result};
pub use grades::{CourseMarks, GradesClient, MarksReport};
pub use messaging::Messaging;
pub use rpc::AjaxGateway;
pub use session::{Page, Session};
pub use timetable::{DaySchedule, Lesson, TimetableClient};
