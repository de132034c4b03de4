//! snarkjs `.zkey` header reader
//!
//! Only the Groth16 header is decoded: enough to size the public signals
//! buffer and to reject keys for other protocols or curves.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use ark_bn254::Fq;
use ark_ff::{BigInteger, PrimeField};
use tracing::debug;

use crate::error::NativeError;

const MAGIC: &[u8; 4] = b"zkey";
const SECTION_HEADER: u32 = 1;
const SECTION_GROTH16_HEADER: u32 = 2;
const PROTOCOL_GROTH16: u32 = 1;

/// Groth16 header of a proving key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkeyHeader {
    /// Bytes per base field element
    pub n8q: u32,
    /// Bytes per scalar field element
    pub n8r: u32,
    /// Number of circuit signals, constant one included
    pub n_vars: u32,
    /// Number of public signals
    pub n_public: u32,
    /// FFT domain size
    pub domain_size: u32,
}

impl ZkeyHeader {
    /// Read the header of the key at `path`
    pub fn read(path: &Path) -> Result<Self, NativeError> {
        let file = File::open(path).map_err(|e| {
            NativeError::prover(format!("Failed to open zkey {}: {e}", path.display()))
        })?;
        let header = Self::parse(&mut BufReader::new(file))?;
        debug!(
            "Loaded zkey header from {}: {} public signals",
            path.display(),
            header.n_public
        );
        Ok(header)
    }

    /// Parse a header from any seekable source
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self, NativeError> {
        let mut magic = [0u8; 4];
        read_exact(reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(NativeError::prover("Invalid zkey file: bad magic"));
        }
        let _version = read_u32(reader)?;
        let n_sections = read_u32(reader)?;

        let mut protocol = None;
        let mut header = None;
        for _ in 0..n_sections {
            let section = read_u32(reader)?;
            let size = read_u64(reader)?;
            let start = reader.stream_position().map_err(io_error)?;

            match section {
                SECTION_HEADER => protocol = Some(read_u32(reader)?),
                SECTION_GROTH16_HEADER => header = Some(Self::parse_groth16(reader)?),
                _ => {}
            }

            let next = start
                .checked_add(size)
                .ok_or_else(|| NativeError::prover("Invalid zkey file: section size overflow"))?;
            reader.seek(SeekFrom::Start(next)).map_err(io_error)?;
        }

        match protocol {
            Some(PROTOCOL_GROTH16) => {}
            Some(other) => {
                return Err(NativeError::prover(format!(
                    "zkey file is not groth16 (protocol {other})"
                )))
            }
            None => return Err(NativeError::prover("Invalid zkey file: missing header section")),
        }
        header.ok_or_else(|| NativeError::prover("Invalid zkey file: missing groth16 header"))
    }

    fn parse_groth16<R: Read>(reader: &mut R) -> Result<Self, NativeError> {
        let n8q = read_u32(reader)?;
        let q = read_vec(reader, n8q)?;
        let n8r = read_u32(reader)?;
        let _r = read_vec(reader, n8r)?;
        let n_vars = read_u32(reader)?;
        let n_public = read_u32(reader)?;
        let domain_size = read_u32(reader)?;

        if q != Fq::MODULUS.to_bytes_le() {
            return Err(NativeError::prover("zkey curve not supported"));
        }

        Ok(Self {
            n8q,
            n8r,
            n_vars,
            n_public,
            domain_size,
        })
    }
}

fn io_error(e: std::io::Error) -> NativeError {
    NativeError::prover(format!("Invalid zkey file: {e}"))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), NativeError> {
    reader.read_exact(buf).map_err(io_error)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, NativeError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, NativeError> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_vec<R: Read>(reader: &mut R, len: u32) -> Result<Vec<u8>, NativeError> {
    if len > 64 {
        return Err(NativeError::prover("Invalid zkey file: field size too large"));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}

/// Builds minimal `.zkey` images for tests
#[cfg(any(test, feature = "mock"))]
pub mod testing {
    use ark_bn254::{Fq, Fr};
    use ark_ff::{BigInteger, PrimeField};

    /// A zkey holding only the header sections, with `n_public` public signals
    pub fn header_only_zkey(protocol: u32, n_public: u32) -> Vec<u8> {
        let q = Fq::MODULUS.to_bytes_le();
        let r = Fr::MODULUS.to_bytes_le();

        let mut groth16 = Vec::new();
        groth16.extend_from_slice(&(q.len() as u32).to_le_bytes());
        groth16.extend_from_slice(&q);
        groth16.extend_from_slice(&(r.len() as u32).to_le_bytes());
        groth16.extend_from_slice(&r);
        groth16.extend_from_slice(&(n_public + 2).to_le_bytes());
        groth16.extend_from_slice(&n_public.to_le_bytes());
        groth16.extend_from_slice(&4u32.to_le_bytes());

        let mut out = Vec::new();
        out.extend_from_slice(b"zkey");
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());

        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&4u64.to_le_bytes());
        out.extend_from_slice(&protocol.to_le_bytes());

        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(groth16.len() as u64).to_le_bytes());
        out.extend_from_slice(&groth16);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_header() {
        let image = testing::header_only_zkey(1, 3);
        let header = ZkeyHeader::parse(&mut Cursor::new(image)).unwrap();
        assert_eq!(header.n_public, 3);
        assert_eq!(header.n_vars, 5);
        assert_eq!(header.n8q, 32);
        assert_eq!(header.n8r, 32);
    }

    #[test]
    fn test_rejects_other_protocols() {
        let image = testing::header_only_zkey(2, 3);
        let err = ZkeyHeader::parse(&mut Cursor::new(image)).unwrap_err();
        assert_eq!(err, NativeError::prover("zkey file is not groth16 (protocol 2)"));
    }

    #[test]
    fn test_rejects_bad_magic_and_truncation() {
        let err = ZkeyHeader::parse(&mut Cursor::new(b"wtns\x01\x00".to_vec())).unwrap_err();
        assert_eq!(err, NativeError::prover("Invalid zkey file: bad magic"));

        let mut image = testing::header_only_zkey(1, 3);
        image.truncate(40);
        assert!(matches!(
            ZkeyHeader::parse(&mut Cursor::new(image)),
            Err(NativeError::Prover { .. })
        ));
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&testing::header_only_zkey(1, 7)).unwrap();

        let header = ZkeyHeader::read(file.path()).unwrap();
        assert_eq!(header.n_public, 7);

        let err = ZkeyHeader::read(Path::new("/nonexistent/circuit.zkey")).unwrap_err();
        assert!(matches!(err, NativeError::Prover { .. }));
    }
}
