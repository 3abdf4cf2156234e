use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid actor id: {0}")]
pub struct InvalidActorId(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid op id: {0}")]
pub struct InvalidOpId(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid object id: {0}")]
pub struct InvalidObjectId(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid element id: {0}")]
pub struct InvalidElementId(pub String);
