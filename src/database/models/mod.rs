pub mod document_version;
pub mod owner_link;
pub mod principal;

pub use document_version::{DocumentVersion, NewDocumentVersion, Validity};
pub use owner_link::OwnerLink;
pub use principal::{Principal, PrincipalRow, Role};
