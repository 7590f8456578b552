use anyhow::Context;

use super::{CodecCommand, PolicyCommand, print_json};
use crate::config::parse_network;
use crate::policy::{detect_preset, label_for_address, pad_targets, unpad_targets};
use crate::starknet::{Felt, decode_byte_array, encode_byte_array};

pub(super) fn run_policy(command: PolicyCommand) -> anyhow::Result<()> {
    match command {
        PolicyCommand::Pad { targets } => print_json(&pad_targets(&targets)),
        PolicyCommand::Unpad { slots } => print_json(&unpad_targets(&slots)),
        PolicyCommand::Detect { network, targets } => {
            let network = parse_network(&network, "--network")?;
            println!("{}", detect_preset(&targets, network).as_str());
            Ok(())
        }
        PolicyCommand::Label { address } => {
            println!("{}", label_for_address(&address));
            Ok(())
        }
    }
}

pub(super) fn run_codec(command: CodecCommand) -> anyhow::Result<()> {
    match command {
        CodecCommand::Encode { text } => {
            let felts: Vec<String> = encode_byte_array(&text)
                .iter()
                .map(Felt::to_hex)
                .collect();
            print_json(&felts)
        }
        CodecCommand::Decode { felts } => {
            let parsed = felts
                .iter()
                .map(|raw| Felt::from_hex(raw).with_context(|| format!("invalid felt '{raw}'")))
                .collect::<anyhow::Result<Vec<_>>>()?;
            println!("{}", decode_byte_array(&parsed)?);
            Ok(())
        }
    }
}
