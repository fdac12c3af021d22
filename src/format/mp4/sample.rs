/// ISO BMFF sample_flags as written in `trun` and summarised in `sdtp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags {
    pub is_leading: u8,
    /// 1: depends on other samples, 2: independent.
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
    pub padding_value: u8,
    pub is_non_sync: bool,
    pub degradation_priority: u16,
}

impl SampleFlags {
    /// An independently decodable sample.
    pub fn sync() -> Self {
        Self {
            depends_on: 2,
            ..Default::default()
        }
    }

    pub fn non_sync() -> Self {
        Self {
            depends_on: 1,
            is_non_sync: true,
            ..Default::default()
        }
    }

    /// The 32-bit sample_flags word.
    pub fn to_u32(&self) -> u32 {
        (((self.is_leading & 0x03) as u32) << 26)
            | (((self.depends_on & 0x03) as u32) << 24)
            | (((self.is_depended_on & 0x03) as u32) << 22)
            | (((self.has_redundancy & 0x03) as u32) << 20)
            | (((self.padding_value & 0x07) as u32) << 17)
            | ((self.is_non_sync as u32) << 16)
            | self.degradation_priority as u32
    }

    /// The one-byte `sdtp` entry.
    pub fn dependency_byte(&self) -> u8 {
        ((self.is_leading & 0x03) << 6)
            | ((self.depends_on & 0x03) << 4)
            | ((self.is_depended_on & 0x03) << 2)
            | (self.has_redundancy & 0x03)
    }
}

/// Per-sample entry of a track fragment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp4Sample {
    pub duration: u32,
    pub size: u32,
    pub composition_time_offset: u32,
    pub flags: SampleFlags,
}

impl Mp4Sample {
    pub fn new(is_keyframe: bool, duration: u32, size: u32, composition_time_offset: u32) -> Self {
        Self {
            duration,
            size,
            composition_time_offset,
            flags: if is_keyframe {
                SampleFlags::sync()
            } else {
                SampleFlags::non_sync()
            },
        }
    }
}
