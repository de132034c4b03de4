//! snarkjs JSON artifacts and their BN254 counterparts
//!
//! Proofs, verification keys and public signals cross the bridge as the JSON
//! documents snarkjs and rapidsnark produce. Curve points are written as
//! decimal affine coordinates with a trailing projective `z`.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::{PrimeField, Zero};
use ark_groth16::{Proof, VerifyingKey};
use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::NativeError;

/// Malformed snarkjs artifact
#[derive(Error, Debug)]
pub enum FormatError {
    /// Not valid JSON for the expected document
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field element is not a decimal number
    #[error("invalid number: {value}")]
    InvalidNumber { value: String },

    /// A field element is not reduced modulo the field order
    #[error("value out of field range: {value}")]
    OutOfRange { value: String },

    /// A point has the wrong number of coordinates
    #[error("malformed point: {what}")]
    Shape { what: &'static str },

    /// A point does not lie on the curve
    #[error("point not on curve: {what}")]
    NotOnCurve { what: &'static str },

    /// A point lies outside the prime-order subgroup
    #[error("point not in subgroup: {what}")]
    NotInSubgroup { what: &'static str },

    /// Protocol or curve is not Groth16 over BN254
    #[error("unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: String },
}

impl From<FormatError> for NativeError {
    fn from(e: FormatError) -> Self {
        Self::verifier(e.to_string())
    }
}

/// snarkjs proof JSON
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofJson {
    /// Proof point A (G1)
    pub pi_a: Vec<String>,
    /// Proof point B (G2)
    pub pi_b: Vec<Vec<String>>,
    /// Proof point C (G1)
    pub pi_c: Vec<String>,
    /// Protocol identifier
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Curve identifier
    #[serde(default = "default_curve")]
    pub curve: String,
}

/// snarkjs verification key JSON
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationKeyJson {
    /// Protocol identifier
    pub protocol: String,
    /// Curve identifier
    pub curve: String,
    /// Number of public signals
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    /// alpha in G1
    pub vk_alpha_1: Vec<String>,
    /// beta in G2
    pub vk_beta_2: Vec<Vec<String>>,
    /// gamma in G2
    pub vk_gamma_2: Vec<Vec<String>>,
    /// delta in G2
    pub vk_delta_2: Vec<Vec<String>>,
    /// Input commitment bases, one more than `n_public`
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

fn default_protocol() -> String {
    "groth16".into()
}

fn default_curve() -> String {
    "bn128".into()
}

fn check_groth16_bn128(protocol: &str, curve: &str) -> Result<(), FormatError> {
    if protocol != "groth16" {
        return Err(FormatError::Unsupported {
            what: "protocol",
            value: protocol.to_string(),
        });
    }
    if curve != "bn128" && curve != "bn254" {
        return Err(FormatError::Unsupported {
            what: "curve",
            value: curve.to_string(),
        });
    }
    Ok(())
}

impl ProofJson {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a JSON document
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build from an arkworks proof
    pub fn from_ark(proof: &Proof<Bn254>) -> Self {
        Self {
            pi_a: g1_to_strings(&proof.a),
            pi_b: g2_to_strings(&proof.b),
            pi_c: g1_to_strings(&proof.c),
            protocol: default_protocol(),
            curve: default_curve(),
        }
    }

    /// Decode into an arkworks proof, checking every point
    pub fn to_ark(&self) -> Result<Proof<Bn254>, FormatError> {
        check_groth16_bn128(&self.protocol, &self.curve)?;
        Ok(Proof {
            a: g1_from_strings(&self.pi_a, "pi_a")?,
            b: g2_from_strings(&self.pi_b, "pi_b")?,
            c: g1_from_strings(&self.pi_c, "pi_c")?,
        })
    }
}

impl VerificationKeyJson {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a JSON document
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build from an arkworks verifying key
    pub fn from_ark(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            protocol: default_protocol(),
            curve: default_curve(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_to_strings(&vk.alpha_g1),
            vk_beta_2: g2_to_strings(&vk.beta_g2),
            vk_gamma_2: g2_to_strings(&vk.gamma_g2),
            vk_delta_2: g2_to_strings(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_to_strings).collect(),
        }
    }

    /// Decode into an arkworks verifying key, checking every point
    pub fn to_ark(&self) -> Result<VerifyingKey<Bn254>, FormatError> {
        check_groth16_bn128(&self.protocol, &self.curve)?;
        if self.n_public.checked_add(1) != Some(self.ic.len()) {
            return Err(FormatError::Shape { what: "IC" });
        }

        Ok(VerifyingKey {
            alpha_g1: g1_from_strings(&self.vk_alpha_1, "vk_alpha_1")?,
            beta_g2: g2_from_strings(&self.vk_beta_2, "vk_beta_2")?,
            gamma_g2: g2_from_strings(&self.vk_gamma_2, "vk_gamma_2")?,
            delta_g2: g2_from_strings(&self.vk_delta_2, "vk_delta_2")?,
            gamma_abc_g1: self
                .ic
                .iter()
                .map(|p| g1_from_strings(p, "IC"))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// Parse a public signals document (`["1", "2", ...]`)
pub fn parse_public_signals(json: &str) -> Result<Vec<Fr>, FormatError> {
    let values: Vec<String> = serde_json::from_str(json)?;
    values.iter().map(|v| parse_field(v)).collect()
}

/// Serialize public signals the way the native prover writes them
pub fn public_signals_to_json(signals: &[Fr]) -> Result<String, FormatError> {
    let values: Vec<String> = signals.iter().map(field_to_string).collect();
    Ok(serde_json::to_string(&values)?)
}

/// Decimal string of a field element
pub fn field_to_string<F: PrimeField>(f: &F) -> String {
    let n: BigUint = f.into_bigint().into();
    n.to_string()
}

/// Parse a canonical decimal field element
pub fn parse_field<F: PrimeField>(s: &str) -> Result<F, FormatError> {
    let n = BigUint::from_str_radix(s.trim(), 10).map_err(|_| FormatError::InvalidNumber {
        value: s.to_string(),
    })?;
    let modulus: BigUint = F::MODULUS.into();
    if n >= modulus {
        return Err(FormatError::OutOfRange {
            value: s.to_string(),
        });
    }
    Ok(F::from_le_bytes_mod_order(&n.to_bytes_le()))
}

/// Convert G1 point to string array
fn g1_to_strings(point: &G1Affine) -> Vec<String> {
    if point.infinity {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![field_to_string(&point.x), field_to_string(&point.y), "1".into()]
}

/// Convert G2 point to string array
fn g2_to_strings(point: &G2Affine) -> Vec<Vec<String>> {
    if point.infinity {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![
        vec![field_to_string(&point.x.c0), field_to_string(&point.x.c1)],
        vec![field_to_string(&point.y.c0), field_to_string(&point.y.c1)],
        vec!["1".into(), "0".into()],
    ]
}

fn g1_from_strings(coords: &[String], what: &'static str) -> Result<G1Affine, FormatError> {
    let (x, y) = match coords {
        [x, y] => (x, y),
        [x, y, z] => {
            if parse_field::<Fq>(z)?.is_zero() {
                return Ok(G1Affine::identity());
            }
            (x, y)
        }
        _ => return Err(FormatError::Shape { what }),
    };

    let point = G1Affine::new_unchecked(parse_field(x)?, parse_field(y)?);
    if !point.is_on_curve() {
        return Err(FormatError::NotOnCurve { what });
    }
    if !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(FormatError::NotInSubgroup { what });
    }
    Ok(point)
}

fn g2_from_strings(coords: &[Vec<String>], what: &'static str) -> Result<G2Affine, FormatError> {
    let fq2 = |c: &[String]| -> Result<Fq2, FormatError> {
        match c {
            [c0, c1] => Ok(Fq2::new(parse_field(c0)?, parse_field(c1)?)),
            _ => Err(FormatError::Shape { what }),
        }
    };

    let (x, y) = match coords {
        [x, y] => (fq2(x)?, fq2(y)?),
        [x, y, z] => {
            if fq2(z)?.is_zero() {
                return Ok(G2Affine::identity());
            }
            (fq2(x)?, fq2(y)?)
        }
        _ => return Err(FormatError::Shape { what }),
    };

    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() {
        return Err(FormatError::NotOnCurve { what });
    }
    if !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(FormatError::NotInSubgroup { what });
    }
    Ok(point)
}
