#![no_main]
use libfuzzer_sys::fuzz_target;
use parrec2nii::scaling::ScaleMethod;
use parrec2nii::{Origin, ParRecHeader};

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = ParRecHeader::from_reader(data, true) {
        let _ = header.data_shape();
        let _ = header.zooms();
        let _ = header.scale_table(ScaleMethod::DisplayedValue);
        let _ = header.scale_table(ScaleMethod::FloatingPoint);
        let _ = header.spatial_transform(Origin::Scanner);
        let _ = header.spatial_transform(Origin::Fov);
        let _ = header.diffusion_table();
        let _ = header.echo_train_length();
    }
});
