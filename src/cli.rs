//! Command-line front door: a `clap::Parser` wrapper around the raw
//! token stream, plus the `KEY=VALUE` grammar parser that turns it into
//! a validated [`RunConfig`].

use std::path::PathBuf;

use clap::Parser;

use crate::error::{EngineError, EngineResult};
use crate::polynomial::{feasibility_warning, AParam, CParam, Polynomial};

const QUANT_STEP: f64 = 1.0 / (1u64 << 25) as f64;

#[derive(Parser, Debug)]
#[command(name = "juliatsa")]
#[command(about = "Rigorous interval-arithmetic computation of filled Julia sets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Order-independent KEY=VALUE configuration tokens (FUNC, CMD, C, A, LEN, REVCG, RANGE).
    #[arg(value_name = "TOKEN")]
    pub tokens: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Calc,
    Period { periodic_points: bool },
    Convert,
}

/// The fully validated, clamped configuration the engine runs from.
#[derive(Debug)]
pub struct RunConfig {
    pub polynomial: Polynomial<f64>,
    pub command: Command,
    pub len_bits: u32,
    pub revcg_bits: u32,
    pub range_log2: u32,
    pub stem: String,
}

fn quantize(v: f64) -> f64 {
    (v / QUANT_STEP).round() * QUANT_STEP
}

fn parse_two(value: &str, token: &str) -> EngineResult<(f64, f64)> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 2 {
        return Err(EngineError::InvalidToken {
            token: token.to_string(),
            reason: format!("expected re,im, got {value:?}"),
        });
    }
    let re: f64 = parts[0].trim().parse().map_err(|_| EngineError::InvalidToken {
        token: token.to_string(),
        reason: format!("not a number: {:?}", parts[0]),
    })?;
    let im: f64 = parts[1].trim().parse().map_err(|_| EngineError::InvalidToken {
        token: token.to_string(),
        reason: format!("not a number: {:?}", parts[1]),
    })?;
    Ok((re, im))
}

/// `C=re,im` or `C=re0,re1,im0,im1`.
fn parse_c(value: &str) -> EngineResult<CParam<f64>> {
    let parts: Vec<&str> = value.split(',').collect();
    match parts.len() {
        2 => {
            let (re, im) = parse_two(value, "C")?;
            Ok(CParam::point(quantize(re), quantize(im)))
        }
        4 => {
            let nums: EngineResult<Vec<f64>> = parts
                .iter()
                .map(|p| {
                    p.trim().parse::<f64>().map_err(|_| EngineError::InvalidToken {
                        token: "C".to_string(),
                        reason: format!("not a number: {p:?}"),
                    })
                })
                .collect();
            let nums = nums?;
            Ok(CParam {
                re0: quantize(nums[0]),
                re1: quantize(nums[1]),
                im0: quantize(nums[2]),
                im1: quantize(nums[3]),
            })
        }
        _ => Err(EngineError::InvalidToken {
            token: "C".to_string(),
            reason: format!("expected re,im or re0,re1,im0,im1, got {value:?}"),
        }),
    }
}

fn parse_a(value: &str) -> EngineResult<AParam<f64>> {
    let (re, im) = parse_two(value, "A")?;
    Ok(AParam {
        re: quantize(re),
        im: quantize(im),
    })
}

fn next_power_of_two_log2(r: u32) -> u32 {
    if r <= 1 {
        0
    } else {
        32 - (r - 1).leading_zeros()
    }
}

/// Fold the raw token list into a validated [`RunConfig`]. Unknown keys,
/// duplicate keys, and malformed values are all `InvalidToken` errors;
/// out-of-feasibility-range combinations are a logged warning, not a
/// hard failure (`ConfigOutOfRange` is recoverable).
pub fn parse_tokens(tokens: &[String]) -> EngineResult<(RunConfig, Option<String>)> {
    let mut func: Option<String> = None;
    let mut cmd: Option<Command> = None;
    let mut c = CParam::point(0.0_f64, 0.0);
    let mut a = AParam { re: 0.0, im: 0.0 };
    let mut len_bits: u32 = 10;
    let mut revcg_bits: u32 = 4;
    let mut range_r: u32 = 2;
    let mut stem = "juliatsa".to_string();

    let mut seen_keys = std::collections::HashSet::new();

    for token in tokens {
        let Some((key_raw, value)) = token.split_once('=') else {
            return Err(EngineError::InvalidToken {
                token: token.clone(),
                reason: "expected KEY=VALUE".to_string(),
            });
        };
        let key = key_raw.to_ascii_uppercase();
        if !seen_keys.insert(key.clone()) {
            return Err(EngineError::InvalidToken {
                token: token.clone(),
                reason: format!("duplicate key {key}"),
            });
        }

        match key.as_str() {
            "FUNC" => func = Some(value.to_ascii_uppercase()),
            "CMD" => {
                let upper = value.to_ascii_uppercase();
                cmd = Some(if upper == "CALC" {
                    Command::Calc
                } else if let Some(rest) = upper.strip_prefix("PERIOD") {
                    Command::Period {
                        periodic_points: rest.trim_start_matches(',') == "PP",
                    }
                } else if upper == "CONVERT" {
                    Command::Convert
                } else {
                    return Err(EngineError::InvalidToken {
                        token: token.clone(),
                        reason: format!("unknown command {value:?}"),
                    });
                });
            }
            "C" => c = parse_c(value)?,
            "A" => a = parse_a(value)?,
            "LEN" => {
                let k: u32 = value.parse().map_err(|_| EngineError::InvalidToken {
                    token: token.clone(),
                    reason: format!("not an integer: {value:?}"),
                })?;
                len_bits = k.clamp(8, 31);
            }
            "REVCG" => {
                let b: u32 = value.parse().map_err(|_| EngineError::InvalidToken {
                    token: token.clone(),
                    reason: format!("not an integer: {value:?}"),
                })?;
                revcg_bits = b;
            }
            "RANGE" => {
                let r: u32 = value.parse().map_err(|_| EngineError::InvalidToken {
                    token: token.clone(),
                    reason: format!("not an integer: {value:?}"),
                })?;
                range_r = r.max(1);
            }
            "STEM" => stem = value.to_string(),
            _ => {
                return Err(EngineError::InvalidToken {
                    token: token.clone(),
                    reason: format!("unknown key {key}"),
                });
            }
        }
    }

    let func = func.ok_or_else(|| EngineError::InvalidToken {
        token: "FUNC".to_string(),
        reason: "FUNC is required".to_string(),
    })?;
    let command = cmd.unwrap_or(Command::Calc);

    let polynomial = match func.as_str() {
        "Z2C" => Polynomial::Z2C { c },
        "Z2AZC" => Polynomial::Z2AzC { a, c },
        "Z3AZC" => Polynomial::Z3AzC { a, c },
        "Z4AZC" => Polynomial::Z4AzC { a, c },
        "Z5AZC" => Polynomial::Z5AzC { a, c },
        "Z6AZC" => Polynomial::Z6AzC { a, c },
        other => {
            return Err(EngineError::InvalidToken {
                token: "FUNC".to_string(),
                reason: format!("unsupported function {other}"),
            })
        }
    };

    let n = 1i32 << len_bits;
    let revcg_bits = crate::reverse_graph::choose_revcg_bits(revcg_bits.max(4), n);
    let range_log2 = next_power_of_two_log2(range_r);

    let warning = feasibility_warning(polynomial.degree(), range_log2, len_bits);

    Ok((
        RunConfig {
            polynomial,
            command,
            len_bits,
            revcg_bits,
            range_log2,
            stem,
        },
        warning,
    ))
}

pub fn output_stem(config: &RunConfig) -> PathBuf {
    PathBuf::from(&config.stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_calc_token_set() {
        let tokens = vec!["FUNC=Z2C".to_string(), "C=-1,0".to_string(), "LEN=10".to_string(), "RANGE=2".to_string(), "CMD=CALC".to_string()];
        let (config, _warn) = parse_tokens(&tokens).unwrap();
        assert_eq!(config.len_bits, 10);
        assert_eq!(config.range_log2, 1);
        assert!(matches!(config.command, Command::Calc));
        assert!(matches!(config.polynomial, Polynomial::Z2C { .. }));
    }

    #[test]
    fn tokens_are_case_insensitive_and_order_independent() {
        let a = vec!["func=z2c".to_string(), "c=0,0".to_string(), "len=9".to_string()];
        let b = vec!["LEN=9".to_string(), "C=0,0".to_string(), "FUNC=Z2C".to_string()];
        let (ca, _) = parse_tokens(&a).unwrap();
        let (cb, _) = parse_tokens(&b).unwrap();
        assert_eq!(ca.len_bits, cb.len_bits);
    }

    #[test]
    fn len_clamps_to_valid_range() {
        let tokens = vec!["FUNC=Z2C".to_string(), "C=0,0".to_string(), "LEN=3".to_string()];
        let (config, _) = parse_tokens(&tokens).unwrap();
        assert_eq!(config.len_bits, 8);
        let tokens = vec!["FUNC=Z2C".to_string(), "C=0,0".to_string(), "LEN=99".to_string()];
        let (config, _) = parse_tokens(&tokens).unwrap();
        assert_eq!(config.len_bits, 31);
    }

    #[test]
    fn range_rounds_up_to_power_of_two() {
        let tokens = vec!["FUNC=Z2C".to_string(), "C=0,0".to_string(), "RANGE=3".to_string()];
        let (config, _) = parse_tokens(&tokens).unwrap();
        assert_eq!(config.range_log2, 2); // 3 rounds up to 4 = 2^2
    }

    #[test]
    fn c_quantizes_to_multiples_of_2_pow_minus_25() {
        let tokens = vec!["FUNC=Z2C".to_string(), "C=0.1,0.2".to_string()];
        let (config, _) = parse_tokens(&tokens).unwrap();
        if let Polynomial::Z2C { c } = config.polynomial {
            let scaled = c.re0 * (1u64 << 25) as f64;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        } else {
            panic!("expected Z2C");
        }
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let tokens = vec!["FUNC=Z2C".to_string(), "FUNC=Z3AZC".to_string()];
        assert!(parse_tokens(&tokens).is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let tokens = vec!["FUNC=Z2C".to_string(), "BOGUS=1".to_string()];
        assert!(parse_tokens(&tokens).is_err());
    }

    #[test]
    fn missing_func_is_rejected() {
        let tokens = vec!["LEN=10".to_string()];
        assert!(parse_tokens(&tokens).is_err());
    }

    #[test]
    fn period_command_parses_periodic_point_flag() {
        let tokens = vec!["FUNC=Z2C".to_string(), "C=-1,0".to_string(), "CMD=PERIOD,PP".to_string()];
        let (config, _) = parse_tokens(&tokens).unwrap();
        assert_eq!(config.command, Command::Period { periodic_points: true });
    }
}
