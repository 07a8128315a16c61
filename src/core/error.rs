use std::fmt;

/// Stable error vocabulary shared by every layer of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Parse,
    OutOfMemory,
    Internal,
    BadParameter,
    Forbidden,
    LockTimeout,

    // hash array results
    ElementExists,
    ElementNotFound,
    KeyExists,
    KeyNotFound,

    // documents and collections
    Conflict,
    DocumentNotFound,
    CollectionNotFound,
    DuplicateName,
    IllegalName,
    UniqueConstraintViolated,
    DocumentAttributeMissing,
    DocumentKeyBad,
    DocumentKeyUnexpected,
    DocumentTypeInvalid,
    ShaperFailed,

    // indexes
    IndexNotFound,
    IndexHandleBad,
    CapConstraintAlreadyDefined,
    GeoIndexViolated,
    BitarrayCreationFailure,
    BitarrayCreationFailureDuplicateAttributes,
    BitarrayCreationFailureDuplicateValues,
    BitarrayCreationFailureCardinality,
    BitarrayInsertUnsupportedValue,

    // transactions
    TransactionInternal,
    TransactionNested,
    TransactionUnregisteredCollection,
    TransactionDisallowedOperation,

    // queries
    QueryEmpty,
    QueryParse,
    QueryMultiModify,
    QueryVariableRedeclared,
    QueryBindParametersInvalid,
    QueryBindParameterMissing,
    QueryBindParameterUndeclared,
    QueryBindParameterValueInvalid,
}

impl ErrorKind {
    /// Numeric code reported to callers outside the engine.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Io => 2,
            ErrorKind::OutOfMemory => 3,
            ErrorKind::Internal => 4,
            ErrorKind::BadParameter => 10,
            ErrorKind::Forbidden => 11,
            ErrorKind::LockTimeout => 18,
            ErrorKind::Parse => 600,
            ErrorKind::Conflict => 1200,
            ErrorKind::DocumentNotFound => 1202,
            ErrorKind::CollectionNotFound => 1203,
            ErrorKind::DuplicateName => 1207,
            ErrorKind::IllegalName => 1208,
            ErrorKind::UniqueConstraintViolated => 1210,
            ErrorKind::IndexNotFound => 1212,
            ErrorKind::IndexHandleBad => 1214,
            ErrorKind::CapConstraintAlreadyDefined => 1215,
            ErrorKind::ShaperFailed => 1216,
            ErrorKind::DocumentTypeInvalid => 1227,
            ErrorKind::DocumentKeyBad => 1221,
            ErrorKind::DocumentKeyUnexpected => 1222,
            ErrorKind::GeoIndexViolated => 3400,
            ErrorKind::DocumentAttributeMissing => 3410,
            ErrorKind::BitarrayInsertUnsupportedValue => 3413,
            ErrorKind::BitarrayCreationFailure => 3415,
            ErrorKind::BitarrayCreationFailureDuplicateAttributes => 3417,
            ErrorKind::BitarrayCreationFailureDuplicateValues => 3418,
            ErrorKind::BitarrayCreationFailureCardinality => 3419,
            ErrorKind::QueryParse => 1501,
            ErrorKind::QueryEmpty => 1502,
            ErrorKind::QueryVariableRedeclared => 1511,
            ErrorKind::QueryBindParametersInvalid => 1550,
            ErrorKind::QueryBindParameterMissing => 1551,
            ErrorKind::QueryBindParameterUndeclared => 1552,
            ErrorKind::QueryBindParameterValueInvalid => 1553,
            ErrorKind::QueryMultiModify => 1564,
            ErrorKind::TransactionInternal => 1650,
            ErrorKind::TransactionNested => 1651,
            ErrorKind::TransactionUnregisteredCollection => 1652,
            ErrorKind::TransactionDisallowedOperation => 1653,
            ErrorKind::ElementExists => 10000,
            ErrorKind::ElementNotFound => 10001,
            ErrorKind::KeyExists => 10010,
            ErrorKind::KeyNotFound => 10011,
        }
    }

    /// Violations a multi-index insert rolls back from and reports as a normal failure.
    pub fn is_constraint_violation(self) -> bool {
        matches!(
            self,
            ErrorKind::ElementExists | ErrorKind::KeyExists | ErrorKind::UniqueConstraintViolated
        )
    }

    /// Every bitarray construction failure, including the specific sub-kinds.
    pub fn is_bitarray_creation_failure(self) -> bool {
        matches!(
            self,
            ErrorKind::BitarrayCreationFailure
                | ErrorKind::BitarrayCreationFailureDuplicateAttributes
                | ErrorKind::BitarrayCreationFailureDuplicateValues
                | ErrorKind::BitarrayCreationFailureCardinality
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.kind, self.kind.code(), self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
