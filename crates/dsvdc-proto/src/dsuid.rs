//! dSUID, the 17-byte digitalSTROM unique identifier.
//!
//! Bytes 0-15 carry a 128-bit base identity (a UUID or an EPC96
//! mapped into 16 bytes), byte 16 is the sub-device enumeration index.
//! The canonical text form is 34 upper-case hex characters.
//!
//! Generation follows the prioritised rules from ds-basics:
//! 1. SGTIN-96 available → encode it directly.
//! 2. GTIN + serial → UUIDv5 of `"(01)<GTIN>(21)<serial>"` in the
//!    GS1-128 namespace.
//! 3. An existing UUID → use it directly.
//! 4. Another unique id (EnOcean address, MAC, …) → UUIDv5 in the
//!    matching well-known namespace.
//! 5. Nothing unique available → random UUIDv4 (caller must persist).

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

pub const DSUID_BYTES: usize = 17;
pub const BASE_BYTES: usize = 16;

const SGTIN96_HEADER: u8 = 0x30;
const GID96_HEADER: u8 = 0x35;

/// EPCglobal manager number assigned to digitalSTROM.
const DS_MANAGER: u32 = 0x04175FE;

/// GCP bit length by SGTIN-96 partition value (0-6).
const GCP_BIT_LENGTH: [u32; 7] = [40, 37, 34, 30, 27, 24, 20];

/// Well-known namespace UUIDs for UUIDv5-based dSUID generation.
pub mod namespace {
    use uuid::Uuid;

    /// For SGTIN-128 strings: `"(01)<GTIN>(21)<serial>"`.
    pub const GS1_128: Uuid = Uuid::from_bytes([
        0x8c, 0xa8, 0x38, 0xd5, 0x4c, 0x40, 0x47, 0xcc, 0xba, 0xfa, 0x37, 0xac, 0x89, 0x65, 0x89,
        0x62,
    ]);

    /// For EnOcean device addresses.
    pub const ENOCEAN: Uuid = Uuid::from_bytes([
        0x0b, 0xa9, 0x4a, 0x7b, 0x7c, 0x92, 0x4d, 0xab, 0xb8, 0xe3, 0x5f, 0xe0, 0x9e, 0x83, 0xd0,
        0xf3,
    ]);

    /// For vDC / vDC-host dSUIDs derived from a MAC address or an
    /// implementation id.
    pub const VDC: Uuid = Uuid::from_bytes([
        0x98, 0x88, 0xdd, 0x3d, 0xb3, 0x45, 0x41, 0x09, 0xb0, 0x88, 0x26, 0x73, 0x30, 0x6d, 0x0c,
        0x65,
    ]);

    /// For vdSM dSUIDs derived from a MAC address.
    pub const VDSM: Uuid = Uuid::from_bytes([
        0x19, 0x5d, 0xe5, 0xc0, 0x90, 0x2f, 0x4b, 0x71, 0xa7, 0x06, 0xb4, 0x3b, 0x80, 0x76, 0x5e,
        0x3d,
    ]);
}

#[derive(Debug, thiserror::Error)]
pub enum DsUidError {
    #[error(
        "invalid dSUID string length: expected 34 hex chars, 32 hex chars or a dashed UUID, got {0} hex chars"
    )]
    InvalidLength(usize),
    #[error("invalid hex characters in dSUID string: {0:?}")]
    InvalidHex(String),
    #[error("expected {DSUID_BYTES} bytes, got {0}")]
    InvalidByteCount(usize),
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),
    #[error("SGTIN-96 partition must be 0-6, got {0}")]
    InvalidPartition(u8),
    #[error("SGTIN-96 serial must fit in 38 bits, got {0}")]
    InvalidSerial(u64),
    #[error("cannot interpret an EPC96-based dSUID as UUID")]
    NotUuidBased,
}

/// Kind of identifier encoded in a dSUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DsUidKind {
    /// Legacy GID-96 (EPCglobal) encoding.
    Gid,
    /// SGTIN-96 encoding.
    Sgtin,
    /// RFC 4122 UUID (any version).
    Uuid,
    /// EPC96 marker present but header unrecognised.
    Other,
}

/// A 17-byte digitalSTROM unique identifier.
///
/// Immutable value type; every constructor returns a fresh instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DsUid {
    raw: [u8; DSUID_BYTES],
}

impl DsUid {
    /// Build from the full 17-byte binary representation.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DsUidError> {
        if data.len() != DSUID_BYTES {
            return Err(DsUidError::InvalidByteCount(data.len()));
        }
        let mut raw = [0u8; DSUID_BYTES];
        raw.copy_from_slice(data);
        Ok(Self { raw })
    }

    /// Build from an existing UUID (generation method 3).
    pub fn from_uuid(uuid: Uuid, subdevice_index: u8) -> Self {
        let mut raw = [0u8; DSUID_BYTES];
        raw[..BASE_BYTES].copy_from_slice(uuid.as_bytes());
        raw[BASE_BYTES] = subdevice_index;
        Self { raw }
    }

    /// Build a UUIDv5-based dSUID from a name in a namespace
    /// (generation method 4; also used by methods 2 and 5).
    pub fn from_name_in_space(name: &str, ns: &Uuid) -> Self {
        Self::from_uuid(Uuid::new_v5(ns, name.as_bytes()), 0)
    }

    /// Build from a GTIN plus serial number (generation method 2).
    ///
    /// Combines both into the SGTIN-128 string `"(01)<GTIN>(21)<serial>"`
    /// and hashes it in the GS1-128 namespace.
    pub fn from_gtin_serial(gtin: &str, serial: &str) -> Self {
        let sgtin128 = format!("(01){gtin}(21){serial}");
        Self::from_name_in_space(&sgtin128, &namespace::GS1_128)
    }

    /// Build directly from SGTIN-96 components (generation method 1).
    ///
    /// The 96-bit EPC maps into the dSUID layout with bytes 6-9 zero
    /// (EPC96 marker).
    pub fn from_sgtin96(
        gcp: u64,
        item_ref: u64,
        partition: u8,
        serial: u64,
    ) -> Result<Self, DsUidError> {
        if partition > 6 {
            return Err(DsUidError::InvalidPartition(partition));
        }
        if serial >> 38 != 0 {
            return Err(DsUidError::InvalidSerial(serial));
        }

        let mut raw = [0u8; DSUID_BYTES];
        raw[0] = SGTIN96_HEADER;

        // GCP + item reference together always occupy 44 bits.
        let gcp_bits = GCP_BIT_LENGTH[partition as usize];
        let binary_gtin: u64 = (gcp << (44 - gcp_bits)) | item_ref;

        // Byte 1: filter (3 bits, fixed 1) | partition (3 bits) |
        // top 2 bits of the 44-bit GTIN field.
        raw[1] = (0x01 << 5) | ((partition & 0x07) << 2) | ((binary_gtin >> 42) & 0x03) as u8;
        raw[2] = ((binary_gtin >> 34) & 0xFF) as u8;
        raw[3] = ((binary_gtin >> 26) & 0xFF) as u8;
        raw[4] = ((binary_gtin >> 18) & 0xFF) as u8;
        raw[5] = ((binary_gtin >> 10) & 0xFF) as u8;
        // Bytes 6-9 stay zero (EPC96 marker).
        raw[10] = ((binary_gtin >> 2) & 0xFF) as u8;
        raw[11] = (((binary_gtin & 0x03) << 6) | ((serial >> 32) & 0x3F)) as u8;
        raw[12] = ((serial >> 24) & 0xFF) as u8;
        raw[13] = ((serial >> 16) & 0xFF) as u8;
        raw[14] = ((serial >> 8) & 0xFF) as u8;
        raw[15] = (serial & 0xFF) as u8;

        Ok(Self { raw })
    }

    /// Build from a legacy GID-96 identifier.
    ///
    /// Layout: 8-bit header `0x35`, 28-bit manager number, 24-bit
    /// object class, 36-bit serial, mapped into the dSUID layout with
    /// bytes 6-9 zero.
    pub fn from_gid96(manager: u32, object_class: u32, serial: u64) -> Self {
        let mut epc = [0u8; 12];
        epc[0] = GID96_HEADER;
        epc[1] = ((manager >> 20) & 0xFF) as u8;
        epc[2] = ((manager >> 12) & 0xFF) as u8;
        epc[3] = ((manager >> 4) & 0xFF) as u8;
        epc[4] = (((manager & 0x0F) << 4) as u8) | (((object_class >> 20) & 0x0F) as u8);
        epc[5] = ((object_class >> 12) & 0xFF) as u8;
        epc[6] = ((object_class >> 4) & 0xFF) as u8;
        epc[7] = (((object_class & 0x0F) << 4) as u8) | (((serial >> 32) & 0x0F) as u8);
        epc[8] = ((serial >> 24) & 0xFF) as u8;
        epc[9] = ((serial >> 16) & 0xFF) as u8;
        epc[10] = ((serial >> 8) & 0xFF) as u8;
        epc[11] = (serial & 0xFF) as u8;

        let mut raw = [0u8; DSUID_BYTES];
        raw[0..6].copy_from_slice(&epc[0..6]);
        // Bytes 6-9 stay zero.
        raw[10..16].copy_from_slice(&epc[6..12]);
        Self { raw }
    }

    /// Build a legacy GID-96 dSUID from an Ethernet MAC address,
    /// using the digitalSTROM manager number and an `0xFF....`
    /// object class carrying the first two MAC bytes.
    pub fn from_mac_gid96(mac: &str) -> Result<Self, DsUidError> {
        let m = parse_mac(mac)?;
        let object_class = 0xFF0000 | ((m[0] as u32) << 8) | m[1] as u32;
        let serial =
            ((m[2] as u64) << 24) | ((m[3] as u64) << 16) | ((m[4] as u64) << 8) | m[5] as u64;
        Ok(Self::from_gid96(DS_MANAGER, object_class, serial))
    }

    /// Build a vDC dSUID from the hardware's MAC address via UUIDv5
    /// in the vDC namespace. The MAC is normalised to
    /// `AA:BB:CC:DD:EE:FF` before hashing.
    pub fn from_vdc_mac(mac: &str) -> Result<Self, DsUidError> {
        let normalised = normalise_mac(mac)?;
        Ok(Self::from_name_in_space(&normalised, &namespace::VDC))
    }

    /// Build a dSUID for an EnOcean device from its 32-bit address.
    pub fn from_enocean(address: u32) -> Self {
        Self::from_name_in_space(&format!("{address:08X}"), &namespace::ENOCEAN)
    }

    /// Build a dSUID for an EnOcean device from an 8-char hex address
    /// string (upper-cased before hashing).
    pub fn from_enocean_str(address: &str) -> Self {
        Self::from_name_in_space(&address.to_uppercase(), &namespace::ENOCEAN)
    }

    /// Build a random UUIDv4-based dSUID (generation method 5).
    ///
    /// The caller must persist the result so it stays stable across
    /// restarts.
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4(), 0)
    }

    /// Return a dSUID sharing this base identity but with a different
    /// sub-device index (byte 16).
    pub fn with_subdevice(&self, subdevice_index: u8) -> Self {
        let mut raw = self.raw;
        raw[BASE_BYTES] = subdevice_index;
        Self { raw }
    }

    /// The device-level dSUID (sub-device index 0). Useful as a
    /// grouping key for all vdSDs of one physical device.
    pub fn device_base(&self) -> Self {
        self.with_subdevice(0)
    }

    /// Two dSUIDs belong to the same physical device iff their first
    /// 16 bytes are identical.
    pub fn same_device(&self, other: &DsUid) -> bool {
        self.raw[..BASE_BYTES] == other.raw[..BASE_BYTES]
    }

    pub fn subdevice_index(&self) -> u8 {
        self.raw[BASE_BYTES]
    }

    /// The first 16 bytes (base identity).
    pub fn base_bytes(&self) -> &[u8] {
        &self.raw[..BASE_BYTES]
    }

    /// The full 17-byte representation.
    pub fn as_bytes(&self) -> &[u8; DSUID_BYTES] {
        &self.raw
    }

    /// The base bytes interpreted as a UUID. Fails for EPC96-based
    /// dSUIDs.
    pub fn uuid(&self) -> Result<Uuid, DsUidError> {
        match self.kind() {
            DsUidKind::Uuid | DsUidKind::Other => {
                let mut b = [0u8; BASE_BYTES];
                b.copy_from_slice(&self.raw[..BASE_BYTES]);
                Ok(Uuid::from_bytes(b))
            }
            _ => Err(DsUidError::NotUuidBased),
        }
    }

    /// Detect whether the raw bytes carry SGTIN-96, GID-96 or a UUID.
    pub fn kind(&self) -> DsUidKind {
        // EPC96 encodings leave bytes 6-9 zero.
        if self.raw[6] == 0 && self.raw[7] == 0 && self.raw[8] == 0 && self.raw[9] == 0 {
            match self.raw[0] {
                SGTIN96_HEADER => DsUidKind::Sgtin,
                GID96_HEADER => DsUidKind::Gid,
                _ => DsUidKind::Other,
            }
        } else {
            DsUidKind::Uuid
        }
    }
}

impl fmt::Display for DsUid {
    /// Canonical 34-character upper-case hex representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.raw {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DsUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DsUid({self})")
    }
}

impl FromStr for DsUid {
    type Err = DsUidError;

    /// Parse 34 hex chars (full dSUID), 32 hex chars or a dashed UUID
    /// string (both imply sub-device index 0).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let cleaned: String = value.chars().filter(|c| *c != '-').collect();
        if cleaned.len() != 32 && cleaned.len() != 34 {
            return Err(DsUidError::InvalidLength(cleaned.len()));
        }
        let mut raw = [0u8; DSUID_BYTES];
        for (i, chunk) in cleaned.as_bytes().chunks(2).enumerate() {
            let hex =
                std::str::from_utf8(chunk).map_err(|_| DsUidError::InvalidHex(value.into()))?;
            raw[i] =
                u8::from_str_radix(hex, 16).map_err(|_| DsUidError::InvalidHex(value.into()))?;
        }
        // 32 hex chars: pure base identity, sub-device index stays 0.
        Ok(Self { raw })
    }
}

fn parse_mac(mac: &str) -> Result<[u8; 6], DsUidError> {
    let cleaned: String = mac.chars().filter(|c| *c != ':' && *c != '-').collect();
    if cleaned.len() != 12 {
        return Err(DsUidError::InvalidMac(mac.into()));
    }
    let mut out = [0u8; 6];
    for (i, chunk) in cleaned.as_bytes().chunks(2).enumerate() {
        let hex = std::str::from_utf8(chunk).map_err(|_| DsUidError::InvalidMac(mac.into()))?;
        out[i] = u8::from_str_radix(hex, 16).map_err(|_| DsUidError::InvalidMac(mac.into()))?;
    }
    Ok(out)
}

/// Normalise a MAC address to `AA:BB:CC:DD:EE:FF`.
pub fn normalise_mac(mac: &str) -> Result<String, DsUidError> {
    let b = parse_mac(mac)?;
    Ok(format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let d = DsUid::from_name_in_space("test-device", &namespace::VDC).with_subdevice(3);
        let parsed: DsUid = d.to_string().parse().unwrap();
        assert_eq!(parsed, d);
        assert_eq!(d.to_string().len(), 34);
        assert!(d.to_string().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(d.to_string(), d.to_string().to_uppercase());
    }

    #[test]
    fn accepts_uuid_with_dashes() {
        let u = Uuid::new_v5(&namespace::VDC, b"x");
        let d: DsUid = u.to_string().parse().unwrap();
        assert_eq!(d.subdevice_index(), 0);
        assert_eq!(d.base_bytes(), u.as_bytes());
    }

    #[test]
    fn accepts_32_hex_chars() {
        let d: DsUid = "198C033E330755E78015F97AD093DD1C".parse().unwrap();
        assert_eq!(d.subdevice_index(), 0);
        assert_eq!(d.to_string(), "198C033E330755E78015F97AD093DD1C00");
    }

    #[test]
    fn rejects_bad_strings() {
        assert!("1234".parse::<DsUid>().is_err());
        assert!(
            "GG8C033E330755E78015F97AD093DD1C00"
                .parse::<DsUid>()
                .is_err()
        );
    }

    #[test]
    fn uuid5_matches_uuid_crate() {
        let d = DsUid::from_name_in_space("AA:BB:CC:DD:EE:FF", &namespace::VDC);
        let reference = Uuid::new_v5(&namespace::VDC, b"AA:BB:CC:DD:EE:FF");
        assert_eq!(d.base_bytes(), reference.as_bytes());
        assert_eq!(d.kind(), DsUidKind::Uuid);
    }

    #[test]
    fn subdevice_algebra() {
        let d = DsUid::from_name_in_space("dev", &namespace::ENOCEAN);
        let sub = d.with_subdevice(7);
        assert_eq!(sub.device_base(), d);
        assert_eq!(sub.subdevice_index(), 7);
        assert!(d.same_device(&sub));
        assert_eq!(sub.base_bytes(), d.base_bytes());

        let other = DsUid::from_name_in_space("other", &namespace::ENOCEAN);
        assert!(!d.same_device(&other));
    }

    #[test]
    fn sgtin96_layout() {
        let d = DsUid::from_sgtin96(0x1234, 0x42, 3, 0x3F_0000_0001).unwrap();
        assert_eq!(d.kind(), DsUidKind::Sgtin);
        let raw = d.as_bytes();
        assert_eq!(raw[0], 0x30);
        // EPC96 marker bytes.
        assert_eq!(&raw[6..10], &[0, 0, 0, 0]);
        // filter=1, partition=3 in byte 1.
        assert_eq!(raw[1] >> 5, 1);
        assert_eq!((raw[1] >> 2) & 0x07, 3);
    }

    #[test]
    fn sgtin96_rejects_out_of_range() {
        assert!(DsUid::from_sgtin96(1, 1, 7, 1).is_err());
        assert!(DsUid::from_sgtin96(1, 1, 0, 1 << 38).is_err());
    }

    #[test]
    fn gid96_from_mac() {
        let d = DsUid::from_mac_gid96("12:34:56:78:90:AB").unwrap();
        assert_eq!(d.kind(), DsUidKind::Gid);
        assert_eq!(d.as_bytes()[0], 0x35);
        assert_eq!(&d.as_bytes()[6..10], &[0, 0, 0, 0]);
        // Same MAC in a different notation yields the same dSUID.
        let d2 = DsUid::from_mac_gid96("1234567890ab").unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn vdc_mac_normalisation() {
        let a = DsUid::from_vdc_mac("aa-bb-cc-dd-ee-ff").unwrap();
        let b = DsUid::from_vdc_mac("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(a, b);
        let reference = Uuid::new_v5(&namespace::VDC, b"AA:BB:CC:DD:EE:FF");
        assert_eq!(a.base_bytes(), reference.as_bytes());
    }

    #[test]
    fn enocean_formats_agree() {
        assert_eq!(
            DsUid::from_enocean(0x0512ABCD),
            DsUid::from_enocean_str("0512abcd")
        );
    }

    #[test]
    fn gtin_serial_uses_sgtin128_string() {
        let d = DsUid::from_gtin_serial("07640156791013", "XYZ1");
        let reference = Uuid::new_v5(&namespace::GS1_128, b"(01)07640156791013(21)XYZ1");
        assert_eq!(d.base_bytes(), reference.as_bytes());
    }

    #[test]
    fn random_is_uuid_based() {
        let d = DsUid::random();
        assert_eq!(d.kind(), DsUidKind::Uuid);
        assert_ne!(d, DsUid::random());
    }
}
