mod account;
mod identity;
mod integrity;
mod ledger;
mod money;
mod payout;

pub use account::*;
pub use identity::*;
pub use integrity::*;
pub use ledger::*;
pub use money::*;
pub use payout::*;
