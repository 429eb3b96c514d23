/// Key tag of a DNSKEY (RFC 4034 Appendix B).
///
/// The checksum runs over the DNSKEY RDATA: flags, protocol, algorithm and
/// public key. Algorithm 1 (RSA/MD5) instead takes the most significant 16
/// of the least significant 24 bits of the modulus.
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    if algorithm == 1 {
        return match public_key {
            [.., hi, lo, _] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
    }

    let header = [
        (flags >> 8) as u8,
        flags as u8,
        protocol,
        algorithm,
    ];
    let accumulator = header
        .iter()
        .chain(public_key.iter())
        .enumerate()
        .fold(0u32, |acc, (i, &byte)| {
            if i % 2 == 0 {
                acc + (u32::from(byte) << 8)
            } else {
                acc + u32::from(byte)
            }
        });

    (accumulator + (accumulator >> 16)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};

    #[test]
    fn test_key_tag_ed25519_fixture() {
        let public_key = STANDARD
            .decode("lptXReoBGx/Mg2PqN1BFNvsU6Lu4bBvSGukj/ViuGMI=")
            .unwrap();
        assert_eq!(calculate_key_tag(256, 3, 15, &public_key), 3180);
    }

    #[test]
    fn test_key_tag_depends_on_flags() {
        let public_key = vec![0xab; 32];
        assert_ne!(
            calculate_key_tag(256, 3, 15, &public_key),
            calculate_key_tag(257, 3, 15, &public_key)
        );
    }

    #[test]
    fn test_key_tag_rsamd5() {
        let public_key = vec![0x12, 0x34, 0x56, 0x78];
        assert_eq!(calculate_key_tag(0x0101, 3, 1, &public_key), 0x3456);
        assert_eq!(calculate_key_tag(0x0101, 3, 1, &[0x01, 0x02]), 0);
    }
}
