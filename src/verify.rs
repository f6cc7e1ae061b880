//! The verifier's side of a verification.
//!
//! A signature doesn't carry its commitment point. Instead, the verifier
//! sends the nonce to the aggregation server once per group, adds up the
//! partial commitments it gets back, and then checks the usual Schnorr
//! equation against that sum.
use elliptic_curve::{ops::LinearCombination, Group};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::{
    compat::{CSCurve, PointBytes},
    constants::{GROUPS, POINT_LEN},
    protocol::{Action, MessageData, Participant, Protocol, ProtocolError},
    sign::{challenge, Signature},
};

/// The outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl From<bool> for Verdict {
    fn from(valid: bool) -> Self {
        if valid {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

/// Check a signature against the commitment point of its nonce.
///
/// This checks that `s * G + h * PK = R`, comparing encodings in constant time.
pub fn verify_with_commitment<C: CSCurve>(
    signature: &Signature<C>,
    message: &[u8],
    public_key: &C::AffinePoint,
    commitment: &C::AffinePoint,
) -> Verdict {
    let h = challenge::<C>(&signature.nonce, message);
    let reproduced = C::ProjectivePoint::lincomb(
        &C::ProjectivePoint::generator(),
        &signature.s,
        &C::ProjectivePoint::from(*public_key),
        &h,
    );
    let expected: PointBytes = C::encode_point(commitment);
    let actual: PointBytes = C::encode_point(&reproduced.into());
    Verdict::from(bool::from(actual.ct_eq(&expected)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Send { round: usize },
    AwaitCommitment { round: usize },
    Done,
    Failed,
}

/// One verification, as seen by the verifier.
///
/// This sends the nonce to the server once per group, and returns the verdict
/// once every partial commitment has arrived.
pub struct VerifySession<C: CSCurve> {
    server: Participant,
    signature: Signature<C>,
    message: Vec<u8>,
    public_key: C::AffinePoint,
    commitment: C::ProjectivePoint,
    state: SessionState,
    error: Option<ProtocolError>,
}

impl<C: CSCurve> VerifySession<C> {
    pub fn new(
        server: Participant,
        signature: Signature<C>,
        message: &[u8],
        public_key: C::AffinePoint,
    ) -> Self {
        Self {
            server,
            signature,
            message: message.to_vec(),
            public_key,
            commitment: C::ProjectivePoint::identity(),
            state: SessionState::Send { round: 0 },
            error: None,
        }
    }
}

impl<C: CSCurve> Protocol for VerifySession<C> {
    type Output = Verdict;

    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError> {
        if let Some(e) = self.error.take() {
            self.state = SessionState::Failed;
            return Err(e);
        }
        match self.state {
            SessionState::Send { round } => {
                debug!(round = round + 1, "requesting partial commitment");
                self.state = SessionState::AwaitCommitment { round };
                Ok(Action::SendPrivate(
                    self.server,
                    self.signature.nonce.as_bytes().to_vec(),
                ))
            }
            SessionState::AwaitCommitment { .. } => Ok(Action::Wait),
            SessionState::Done => {
                let verdict = verify_with_commitment(
                    &self.signature,
                    &self.message,
                    &self.public_key,
                    &self.commitment.into(),
                );
                Ok(Action::Return(verdict))
            }
            SessionState::Failed => Err(ProtocolError::AssertionFailed(
                "session has already failed".to_string(),
            )),
        }
    }

    fn message(&mut self, from: Participant, data: MessageData) {
        if from != self.server {
            return;
        }
        let round = match self.state {
            SessionState::AwaitCommitment { round } => round,
            SessionState::Failed => return,
            _ => {
                self.error = Some(ProtocolError::AssertionFailed(
                    "message arrived out of turn".to_string(),
                ));
                return;
            }
        };
        let bytes: PointBytes = match data.as_slice().try_into() {
            Ok(bytes) => bytes,
            Err(_) => {
                self.error = Some(ProtocolError::MalformedMessage {
                    expected: POINT_LEN,
                    found: data.len(),
                });
                return;
            }
        };
        match C::decode_point(&bytes) {
            Ok(point) => self.commitment += C::ProjectivePoint::from(point),
            Err(e) => {
                self.error = Some(e.into());
                return;
            }
        }
        self.state = if round + 1 < GROUPS {
            SessionState::Send { round: round + 1 }
        } else {
            SessionState::Done
        };
    }
}
