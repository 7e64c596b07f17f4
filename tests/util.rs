#![allow(dead_code)]

use byteordered::ByteOrdered;
use flate2::read::GzDecoder;
use parrec2nii::{NiftiHeader, NiftiType};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Description of a synthetic PAR/REC acquisition, version 4.2.
#[derive(Debug, Clone)]
pub struct Synthetic {
    pub nx: usize,
    pub ny: usize,
    pub slices: usize,
    pub volumes: usize,
    pub bits: u32,
    /// Rescale slope and intercept of each volume.
    pub scaling: Vec<(f64, f64)>,
    pub scale_slope: f64,
    /// b-value and `(ap, fh, rl)` gradient of each volume.
    pub diffusion: Option<Vec<(f64, [f64; 3])>>,
    pub epi_factor: i64,
    pub water_fat_shift: f64,
    /// Number of trailing slices missing from the REC file.
    pub missing_slices: usize,
}

impl Default for Synthetic {
    fn default() -> Self {
        Synthetic {
            nx: 4,
            ny: 3,
            slices: 2,
            volumes: 3,
            bits: 16,
            scaling: vec![(2.5, -3.); 3],
            scale_slope: 0.5,
            diffusion: None,
            epi_factor: 0,
            water_fat_shift: 11.5,
            missing_slices: 0,
        }
    }
}

impl Synthetic {
    pub fn volume_len(&self) -> usize {
        self.nx * self.ny * self.slices
    }

    /// Raw samples in Fortran order `(x, y, slice, volume)`.
    pub fn samples(&self) -> Vec<u16> {
        let modulus = if self.bits == 8 { 251 } else { 4001 };
        (0..self.volume_len() * self.volumes)
            .map(|i| ((i * 37 + 11) % modulus) as u16)
            .collect()
    }

    pub fn par_text(&self) -> String {
        let mut text = String::from(
            "# === DATA DESCRIPTION FILE ======================================================\n\
             #\n\
             # CLINICAL TRYOUT             Research image export tool     V4.2\n\
             #\n\
             # === GENERAL INFORMATION ========================================================\n\
             #\n",
        );
        let general: Vec<(&str, String)> = vec![
            ("Patient name", "phantom".into()),
            ("Protocol name", "synthetic".into()),
            ("Max. number of slices/locations", self.slices.to_string()),
            ("Max. number of dynamics", self.volumes.to_string()),
            ("Repetition time [ms]", "2000.000".into()),
            ("FOV (ap,fh,rl) [mm]", "240.000  117.000  240.000".into()),
            ("Water Fat shift [pixels]", self.water_fat_shift.to_string()),
            ("Angulation midslice(ap,fh,rl)[degr]", "0.000  0.000  0.000".into()),
            ("Off Centre midslice(ap,fh,rl) [mm]", "5.000  -10.000  2.500".into()),
            ("EPI factor        <0,1=no EPI>", self.epi_factor.to_string()),
            ("Dynamic scan      <0=no 1=yes> ?", "1".into()),
            (
                "Diffusion         <0=no 1=yes> ?",
                if self.diffusion.is_some() { "1" } else { "0" }.into(),
            ),
        ];
        for (label, value) in general {
            text += &format!(".    {:<35}:   {}\n", label, value);
        }
        text += "#\n# === IMAGE INFORMATION ==========================================================\n";
        for v in 0..self.volumes {
            for s in 0..self.slices {
                text += &self.row(v, s);
                text += "\n";
            }
        }
        text += "\n# === END OF DATA DESCRIPTION FILE ===============================================\n";
        text
    }

    fn row(&self, volume: usize, slice: usize) -> String {
        let (rs, ri) = self.scaling[volume];
        let (b, grad) = match &self.diffusion {
            Some(table) => table[volume],
            None => (0., [0., 0., 0.]),
        };
        let mut v = vec![0f64; 49];
        v[0] = (slice + 1) as f64;
        v[1] = 1.;
        v[2] = (volume + 1) as f64;
        v[3] = 1.;
        v[6] = (volume * self.slices + slice) as f64;
        v[7] = f64::from(self.bits);
        v[8] = 100.;
        v[9] = self.nx as f64;
        v[10] = self.ny as f64;
        v[11] = ri;
        v[12] = rs;
        v[13] = self.scale_slope;
        v[22] = 3.;
        v[23] = 0.5;
        v[25] = 1.;
        v[28] = 2.;
        v[29] = 2.;
        v[33] = b;
        v[41] = 1.;
        v[42] = 1.;
        v[45] = grad[0];
        v[46] = grad[1];
        v[47] = grad[2];
        v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")
    }

    pub fn rec_bytes(&self) -> Vec<u8> {
        let samples = self.samples();
        let kept = samples.len() - self.missing_slices * self.nx * self.ny;
        let mut bytes = Vec::new();
        for s in &samples[..kept] {
            if self.bits == 8 {
                bytes.push(*s as u8);
            } else {
                bytes.extend_from_slice(&s.to_le_bytes());
            }
        }
        bytes
    }

    /// Write `<name>.PAR` and `<name>.REC` to `dir`, returning the PAR path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let par = dir.join(format!("{}.PAR", name));
        fs::write(&par, self.par_text()).unwrap();
        let mut rec = fs::File::create(dir.join(format!("{}.REC", name))).unwrap();
        rec.write_all(&self.rec_bytes()).unwrap();
        par
    }
}

/// A NIfTI-1 file read back from disk.
#[derive(Debug)]
pub struct NiftiFile {
    pub header: NiftiHeader,
    /// Bytes between the header and the data, extender included.
    pub extensions: Vec<u8>,
    pub payload: Vec<u8>,
}

impl NiftiFile {
    pub fn open<P: AsRef<Path>>(path: P) -> NiftiFile {
        let path = path.as_ref();
        let mut bytes = fs::read(path).unwrap();
        if path.extension().map(|e| e == "gz").unwrap_or(false) {
            let mut inflated = Vec::new();
            let _ = GzDecoder::new(&bytes[..]).read_to_end(&mut inflated).unwrap();
            bytes = inflated;
        }
        let header = NiftiHeader::from_reader(&bytes[..]).unwrap();
        let offset = header.vox_offset as usize;
        NiftiFile {
            extensions: bytes[348..offset].to_vec(),
            payload: bytes[offset..].to_vec(),
            header,
        }
    }

    /// The stored samples as `f64`, without applying the header scaling.
    pub fn values(&self) -> Vec<f64> {
        let datatype = self.header.data_type().unwrap();
        let count = self.payload.len() / datatype.size_of();
        let mut src = ByteOrdered::runtime(&self.payload[..], self.header.endianness);
        (0..count)
            .map(|_| match datatype {
                NiftiType::Uint8 => f64::from(src.read_u8().unwrap()),
                NiftiType::Uint16 => f64::from(src.read_u16().unwrap()),
                NiftiType::Float64 => src.read_f64().unwrap(),
                other => panic!("unexpected datatype {:?}", other),
            })
            .collect()
    }
}
