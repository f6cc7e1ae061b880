//! The aggregation server's side of a verification.
//!
//! The server holds the public tables, and answers each round of a
//! verification by adding up the points the nonce selects in one group.
//! It learns nothing about the message or the signer's secrets.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
    compat::{CSCurve, SerializablePoint},
    constants::{GROUPS, NONCE_LEN},
    keys::{GroupKey, Nonce},
    params::Parameters,
    protocol::{Action, InitializationError, MessageData, Participant, Protocol, ProtocolError},
    selection::select,
    serde::{decode, encode},
    table::PublicTable,
};

/// Everything the aggregation server holds.
#[derive(Clone, Debug)]
pub struct ServingContext<C: CSCurve> {
    params: Parameters,
    group_keys: [GroupKey; GROUPS],
    /// One table per group.
    tables: Vec<PublicTable<C>>,
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
struct ServingContextRepr<C: CSCurve> {
    params: Parameters,
    group_keys: [GroupKey; GROUPS],
    tables: Vec<Vec<SerializablePoint<C>>>,
}

impl<C: CSCurve> ServingContext<C> {
    pub(crate) fn new(
        params: Parameters,
        group_keys: [GroupKey; GROUPS],
        tables: Vec<PublicTable<C>>,
    ) -> Self {
        Self {
            params,
            group_keys,
            tables,
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// The public table of a group, counting groups from 0.
    pub fn table(&self, group: usize) -> Option<&PublicTable<C>> {
        self.tables.get(group)
    }

    /// Check that a verifier expects the same parameters as this server.
    pub fn ensure_params(&self, params: &Parameters) -> Result<(), InitializationError> {
        self.params.ensure_matches(params)
    }

    /// The contribution of one group to the commitment point of a nonce.
    ///
    /// Groups are counted from 0.
    pub fn partial_commitment(
        &self,
        group: usize,
        nonce: &Nonce,
    ) -> Result<C::AffinePoint, ProtocolError> {
        let (key, table) = match (self.group_keys.get(group), self.tables.get(group)) {
            (Some(key), Some(table)) => (key, table),
            _ => {
                return Err(ProtocolError::AssertionFailed(format!(
                    "group {group} does not exist"
                )))
            }
        };
        let mut points = select(nonce, key, &self.params).into_iter().map(|i| {
            table
                .get(i)
                .copied()
                .map(C::ProjectivePoint::from)
                .ok_or_else(|| {
                    ProtocolError::AssertionFailed(format!("index {i} outside of table"))
                })
        });
        let first = points.next().ok_or_else(|| {
            ProtocolError::AssertionFailed("selection produced no indices".to_string())
        })??;
        let sum = points.try_fold(first, |acc, p| p.map(|p| acc + p))?;
        Ok(sum.into())
    }

    /// The full commitment point of a nonce, summed over every group.
    pub fn commitment(&self, nonce: &Nonce) -> Result<C::AffinePoint, ProtocolError> {
        let mut sum = C::ProjectivePoint::from(self.partial_commitment(0, nonce)?);
        for group in 1..GROUPS {
            sum += C::ProjectivePoint::from(self.partial_commitment(group, nonce)?);
        }
        Ok(sum.into())
    }

    /// Serialize this context, to hand it over to the server process.
    pub fn to_bytes(&self) -> Result<Vec<u8>, InitializationError> {
        let repr = ServingContextRepr::<C> {
            params: self.params,
            group_keys: self.group_keys,
            tables: self
                .tables
                .iter()
                .map(|t| t.iter().map(SerializablePoint::from_affine).collect())
                .collect(),
        };
        encode(&repr)
    }

    /// Deserialize a context produced by [ServingContext::to_bytes].
    ///
    /// This checks that the tables have the shape the parameters describe.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InitializationError> {
        let repr: ServingContextRepr<C> = decode(bytes)?;
        repr.params.validate()?;
        let table_size = repr.params.table_size();
        let tables: Vec<PublicTable<C>> = repr
            .tables
            .into_iter()
            .map(|t| {
                if t.len() != table_size {
                    return Err(InitializationError::BadEncoding(format!(
                        "table has {} entries, expected {}",
                        t.len(),
                        table_size
                    )));
                }
                Ok(PublicTable::from_points(
                    t.into_iter().map(SerializablePoint::to_affine).collect(),
                ))
            })
            .collect::<Result<_, _>>()?;
        if tables.len() != GROUPS {
            return Err(InitializationError::BadEncoding(format!(
                "found {} tables, expected {}",
                tables.len(),
                GROUPS
            )));
        }
        Ok(Self::new(repr.params, repr.group_keys, tables))
    }
}

#[derive(Debug, Clone, Copy)]
enum SessionState {
    AwaitNonce { round: usize },
    Reply { round: usize, nonce: Nonce, to: Participant },
    Done { nonce: Nonce },
    Failed,
}

/// One verification, as seen by the server.
///
/// Each round, the peer sends a nonce, and gets back the partial commitment
/// of the next group. The session ends after every group has been answered,
/// returning the nonce it was asked about.
///
/// The session locks onto the first participant to send it a message, and
/// ignores everybody else.
pub struct AggregationSession<C: CSCurve> {
    context: Arc<ServingContext<C>>,
    peer: Option<Participant>,
    first_nonce: Option<Nonce>,
    state: SessionState,
    error: Option<ProtocolError>,
}

impl<C: CSCurve> AggregationSession<C> {
    pub fn new(context: Arc<ServingContext<C>>) -> Self {
        Self {
            context,
            peer: None,
            first_nonce: None,
            state: SessionState::AwaitNonce { round: 0 },
            error: None,
        }
    }

    /// The participant this session is serving, once it's known.
    pub fn peer(&self) -> Option<Participant> {
        self.peer
    }
}

impl<C: CSCurve> Protocol for AggregationSession<C> {
    type Output = Nonce;

    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError> {
        if let Some(e) = self.error.take() {
            self.state = SessionState::Failed;
            return Err(e);
        }
        match self.state {
            SessionState::AwaitNonce { .. } => Ok(Action::Wait),
            SessionState::Reply { round, nonce, to } => {
                let point = self
                    .context
                    .partial_commitment(round, &nonce)
                    .map_err(|e| {
                        error!(round = round + 1, error = %e, "failed to aggregate points");
                        self.state = SessionState::Failed;
                        e
                    })?;
                debug!(round = round + 1, "sending partial commitment");
                self.state = if round + 1 < GROUPS {
                    SessionState::AwaitNonce { round: round + 1 }
                } else {
                    SessionState::Done { nonce }
                };
                Ok(Action::SendPrivate(to, C::encode_point(&point).to_vec()))
            }
            SessionState::Done { nonce } => Ok(Action::Return(nonce)),
            SessionState::Failed => Err(ProtocolError::AssertionFailed(
                "session has already failed".to_string(),
            )),
        }
    }

    fn message(&mut self, from: Participant, data: MessageData) {
        match self.peer {
            None => self.peer = Some(from),
            Some(peer) if peer != from => return,
            Some(_) => {}
        }
        let round = match self.state {
            SessionState::AwaitNonce { round } => round,
            SessionState::Failed => return,
            _ => {
                self.error = Some(ProtocolError::AssertionFailed(
                    "message arrived out of turn".to_string(),
                ));
                return;
            }
        };
        let nonce = match Nonce::from_slice(&data) {
            Some(nonce) => nonce,
            None => {
                self.error = Some(ProtocolError::MalformedMessage {
                    expected: NONCE_LEN,
                    found: data.len(),
                });
                return;
            }
        };
        match self.first_nonce {
            None => self.first_nonce = Some(nonce),
            Some(first) if first != nonce => {
                warn!(round = round + 1, "nonce changed during session");
            }
            Some(_) => {}
        }
        self.state = SessionState::Reply {
            round,
            nonce,
            to: from,
        };
    }
}
