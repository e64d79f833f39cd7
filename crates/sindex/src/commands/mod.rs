pub(crate) use completions::Completions;
pub(crate) use config::Config;
pub(crate) use dindex::Dindex;
pub(crate) use init::Init;
pub(crate) use lookup::Lookup;
pub(crate) use rank::Rank;
pub(crate) use sindex::Sindex;

mod completions;
mod config;
mod dindex;
mod init;
mod lookup;
mod rank;
mod sindex;
