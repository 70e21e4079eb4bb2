use std::fmt;

/// Validity classification carried by every [`crate::Solid`].
///
/// A solid whose status is anything but [`Status::NoError`] has no geometry.
/// Operations on such a solid propagate the status instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    NoError,
    NonFiniteVertex,
    NotManifold,
    VertexOutOfBounds,
    PropertiesWrongLength,
    MissingPositionProperties,
    MergeVectorsDifferentLengths,
    MergeIndexOutOfBounds,
    TransformWrongLength,
    RunIndexWrongLength,
    FaceIdWrongLength,
    InvalidConstruction,
    ResultTooLarge,
}

impl Status {
    /// Every status, in declaration order
    pub const ALL: [Status; 13] = [
        Status::NoError,
        Status::NonFiniteVertex,
        Status::NotManifold,
        Status::VertexOutOfBounds,
        Status::PropertiesWrongLength,
        Status::MissingPositionProperties,
        Status::MergeVectorsDifferentLengths,
        Status::MergeIndexOutOfBounds,
        Status::TransformWrongLength,
        Status::RunIndexWrongLength,
        Status::FaceIdWrongLength,
        Status::InvalidConstruction,
        Status::ResultTooLarge,
    ];

    /// Stable CamelCase code shown to scripts
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NoError => "NoError",
            Status::NonFiniteVertex => "NonFiniteVertex",
            Status::NotManifold => "NotManifold",
            Status::VertexOutOfBounds => "VertexOutOfBounds",
            Status::PropertiesWrongLength => "PropertiesWrongLength",
            Status::MissingPositionProperties => "MissingPositionProperties",
            Status::MergeVectorsDifferentLengths => "MergeVectorsDifferentLengths",
            Status::MergeIndexOutOfBounds => "MergeIndexOutOfBounds",
            Status::TransformWrongLength => "TransformWrongLength",
            Status::RunIndexWrongLength => "RunIndexWrongLength",
            Status::FaceIdWrongLength => "FaceIDWrongLength",
            Status::InvalidConstruction => "InvalidConstruction",
            Status::ResultTooLarge => "ResultTooLarge",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::NoError
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
