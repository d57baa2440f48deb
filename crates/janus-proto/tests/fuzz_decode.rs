use janus_proto::decode_envelope;
use rand::{thread_rng, Rng};

#[test]
fn fuzz_decode_envelope_never_panics() {
    let mut rng = thread_rng();
    for _ in 0..10_000 {
        let len: usize = rng.gen_range(0..512);
        let data: String = (0..len).map(|_| rng.gen_range(' '..='~')).collect();
        let _ = decode_envelope(&data);
    }
}

#[test]
fn random_mutation_of_valid_envelope_is_handled() {
    let mut rng = thread_rng();
    let valid = r#"{"janus":"event","sender":1,"jsep":{"type":"answer","sdp":"v=0"}}"#;

    for _ in 0..1_000 {
        let mut mutated: Vec<u8> = valid.as_bytes().to_vec();
        let flip_count = rng.gen_range(1..6);
        for _ in 0..flip_count {
            let idx = rng.gen_range(0..mutated.len());
            mutated[idx] = rng.gen_range(b' '..=b'~');
        }
        if let Ok(text) = std::str::from_utf8(&mutated) {
            let _ = decode_envelope(text);
        }
    }
}
