//! HashVault data model.
//!
//! Types shared between the content store client, the ledger client and the
//! upload/provenance core: content addresses, the record keys derived from
//! them, canonical owner identities and the provenance records themselves.

pub mod content;
pub mod owner;
pub mod record;
pub mod time;

pub use content::*;
pub use owner::*;
pub use record::*;
pub use time::*;
