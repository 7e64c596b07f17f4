#![no_main]
use libfuzzer_sys::fuzz_target;
use parrec2nii::writer::write_header;
use parrec2nii::NiftiHeader;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = NiftiHeader::from_reader(data) {
        let _ = header.shape();
        let _ = header.data_type();
        let _ = header.sform_affine();
        let mut bytes = Vec::new();
        write_header(&mut bytes, &header).unwrap();
        assert_eq!(bytes.len(), 348);
    }
});
