use super::*;

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "panelwave_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn float_wav_reads_back_unchanged() {
    let dir = temp_dir("wav_float");
    let path = dir.join("nested").join("tone.wav");
    let samples = vec![0.0f32, 0.5, -0.25, 1.0, -1.0, 0.125];
    write_wav(&path, 8_000, 2, &samples).unwrap();

    let frag = read_wav(&path).unwrap();
    assert_eq!(frag.sample_rate, 8_000);
    assert_eq!(frag.channels, 2);
    assert_eq!(frag.samples.as_slice(), samples.as_slice());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn int_wav_is_scaled_to_unit_range() {
    let dir = temp_dir("wav_int");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("pcm16.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(&path, spec).unwrap();
    for v in [0i16, 16_384, -32_768] {
        w.write_sample(v).unwrap();
    }
    w.finalize().unwrap();

    let frag = read_wav(&path).unwrap();
    assert_eq!(frag.samples.as_slice(), &[0.0, 0.5, -1.0]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_is_a_synthesis_error() {
    let err = read_wav(std::path::Path::new("/nonexistent/panelwave/none.wav")).unwrap_err();
    assert!(matches!(err, PanelwaveError::Synthesis(_)));
}

#[test]
fn f32le_writes_little_endian_bytes() {
    let dir = temp_dir("f32le");
    let path = dir.join("mix.f32le");
    write_f32le(&path, &[1.0, -2.0]).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
    assert_eq!(&bytes[4..], &(-2.0f32).to_le_bytes());
    let _ = std::fs::remove_dir_all(&dir);
}
