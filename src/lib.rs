pub mod db;
mod error;
pub mod household;
pub mod id;
pub mod invite;
pub mod join;
pub mod linkage;
pub mod logging;
pub mod migrate;
pub mod profile;
pub mod reconcile;
pub mod repo;
pub mod server;
pub mod state;
pub mod time;

pub use error::{AppError, AppResult};
pub use household::Household;
pub use invite::{InviteGrant, InviteValidationError};
pub use linkage::LinkageRecord;
pub use profile::{Profile, ProfileData};
pub use reconcile::MemberEntry;
pub use state::AppState;
