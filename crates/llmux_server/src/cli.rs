/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Command Line Interface
use once_cell::sync::Lazy;

/// The parsed command-line arguments provided to this program. Lazily initialized.
///
/// # Exits
///
/// Exits if [`argh::from_env`] would exit--for example, if the `--help` flag was provided or the
/// program arguments could not be parsed.
pub static PARSED_COMMANDS: Lazy<TopLevel> = Lazy::new(argh::from_env);

/// Toplevel CLI commands and options.
/// Subcommands are optional.
/// If no command is provided "serve" will be invoked with default options.
#[derive(argh::FromArgs, PartialEq, Debug)]
pub struct TopLevel {
    /// subcommands
    #[argh(subcommand)]
    pub subcommand: Option<Command>,
}

/// Subcommands
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum Command {
    /// starts the gateway.
    Serve(Serve),

    /// prints the llmux version to stdout.
    Version(Version),

    /// generates the openapi spec and exits.
    Oasgen(Oasgen),
}

/// Starts the llmux gateway. This is the default command when no command is provided.
#[derive(argh::FromArgs, PartialEq, Debug, Default)]
#[argh(subcommand, name = "serve")]
pub struct Serve {
    /// if present, overrides the SERVICE_HOST environment variable.
    #[argh(option, short = 'H')]
    pub host: Option<String>,

    /// if present, overrides the SERVICE_PORT environment variable.
    #[argh(option, short = 'p')]
    pub port: Option<u16>,
}

/// Prints the llmux version to stdout.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "version")]
pub struct Version {}

/// Generates the llmux OpenAPI specification.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "oasgen")]
pub struct Oasgen {
    /// if present, llmux will generate the OpenAPI spec in yaml format;
    /// this is the default and can be omitted.
    #[argh(switch, short = 'y')]
    pub yaml: bool,

    /// if present, llmux will generate the OpenAPI spec in JSON format;
    /// the default behavior is to generate yaml output.
    #[argh(switch, short = 'j')]
    pub json: bool,
}

#[cfg(test)]
#[rustfmt::skip]
mod test {
    use super::*;
    use argh::FromArgs;

    #[test]
    fn version() {
        assert_eq!(
            TopLevel::from_args(&["llmux"], &["version"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Version(Version {}))
            }
        );
    }

    #[test]
    fn oasgen_only() {
        assert_eq!(
            TopLevel::from_args(&["llmux"], &["oasgen"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Oasgen(Oasgen {
                    yaml: false,
                    json: false,
                }))
            }
        );
    }

    #[test]
    fn oasgen_json_short() {
        assert_eq!(
            TopLevel::from_args(&["llmux"], &["oasgen", "-j"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Oasgen(Oasgen {
                    yaml: false,
                    json: true,
                }))
            }
        );
    }

    #[test]
    fn serve_only() {
        assert_eq!(
            TopLevel::from_args(&["llmux"], &["serve"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Serve(Serve {
                    host: None,
                    port: None,
                }))
            }
        );
    }

    #[test]
    fn serve_with_bind_overrides() {
        assert_eq!(
            TopLevel::from_args(
                &["llmux"],
                &["serve", "--host", "0.0.0.0", "-p", "3000"]
            )
            .expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Serve(Serve {
                    host: Some("0.0.0.0".to_string()),
                    port: Some(3000),
                }))
            }
        );
    }

    #[test]
    fn no_subcommand_is_allowed() {
        assert_eq!(
            TopLevel::from_args(&["llmux"], &[]).expect("from_args failed"),
            TopLevel { subcommand: None }
        );
    }
}
