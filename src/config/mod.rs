mod engine_desc;
mod mix_options;

pub use engine_desc::{
    AdaptationDesc, AdaptationWeights, AttenuationDesc, EncodingDesc, MeadowSonicEngineDesc,
};
pub use mix_options::MixOptions;
