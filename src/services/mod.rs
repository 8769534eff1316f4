//! Services layer - Business logic
//!
//! This module contains the business logic of the student portal.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod course;
pub mod password;
pub mod session;
pub mod sweeper;
pub mod token;
pub mod user;

pub use course::{CourseService, CourseServiceError};
pub use password::{hash_password, verify_password};
pub use session::{AuthContext, AuthError, IssuedSession, SessionService, SessionStatus};
pub use sweeper::spawn_session_sweeper;
pub use token::{Claims, TokenCodec};
pub use user::{LoginInput, LoginOutcome, RegisterInput, UserService, UserServiceError};
