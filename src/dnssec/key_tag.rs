/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5 keys use the low 16 bits of the modulus
    if algorithm == 1 {
        return match public_key {
            [.., hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
    }

    let header = flags.to_be_bytes();
    let proto_alg = [protocol, algorithm];
    let rdata = header
        .iter()
        .chain(proto_alg.iter())
        .chain(public_key.iter());

    let mut accumulator: u32 = 0;
    for (i, &byte) in rdata.enumerate() {
        accumulator += if i % 2 == 0 {
            u32::from(byte) << 8
        } else {
            u32::from(byte)
        };
    }
    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}
