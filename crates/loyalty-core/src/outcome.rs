//! The `{success, value | error}` envelope returned across the call boundary.

use serde::{de::Error as _, ser::SerializeStruct, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ErrorKind, LedgerResult};

/// Result of one ledger call as seen by an external caller.
///
/// Serialises as `{"success":true,"value":V}` or
/// `{"success":false,"error":"err-..."}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome<V> {
    Success(V),
    Failure(ErrorKind),
}

impl<V> CallOutcome<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<V, ErrorKind> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Failure(kind) => Err(kind),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Success(value) => CallOutcome::Success(f(value)),
            CallOutcome::Failure(kind) => CallOutcome::Failure(kind),
        }
    }
}

impl<V> From<LedgerResult<V>> for CallOutcome<V> {
    fn from(result: LedgerResult<V>) -> Self {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(err) => CallOutcome::Failure(err.kind()),
        }
    }
}

impl<V: Serialize> Serialize for CallOutcome<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CallOutcome", 2)?;
        match self {
            CallOutcome::Success(value) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("value", value)?;
            }
            CallOutcome::Failure(kind) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", kind)?;
            }
        }
        state.end()
    }
}

/// A `success` field that only accepts the literal `B`.
struct Flag<const B: bool>;

impl<'de, const B: bool> Deserialize<'de> for Flag<B> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if bool::deserialize(deserializer)? == B {
            Ok(Flag)
        } else {
            Err(D::Error::custom(format_args!("expected success flag {}", B)))
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireSuccess<V> {
    #[allow(dead_code)]
    success: Flag<true>,
    value: V,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireFailure {
    #[allow(dead_code)]
    success: Flag<false>,
    error: ErrorKind,
}

/// The flag picks the shape, so a `null` value still counts as present.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireOutcome<V> {
    Success(WireSuccess<V>),
    Failure(WireFailure),
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for CallOutcome<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match WireOutcome::<V>::deserialize(deserializer) {
            Ok(WireOutcome::Success(wire)) => Ok(CallOutcome::Success(wire.value)),
            Ok(WireOutcome::Failure(wire)) => Ok(CallOutcome::Failure(wire.error)),
            Err(_) => Err(D::Error::custom(
                "call outcome must carry a value on success or an error on failure",
            )),
        }
    }
}
