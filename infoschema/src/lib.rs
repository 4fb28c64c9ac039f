pub mod acl;
pub mod index_advisor;
pub mod provider;
pub mod tables;

pub use acl::{AclAdapter, AclUser, NoAcl};
pub use index_advisor::{IndexAdvisor, IndexRecommendation};
pub use provider::InformationSchemaProvider;
