// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Simple CLI for compiling and evaluating math expressions

use clap::{Parser, Subcommand};
use octofhir_mathexpr::{
    CompiledExpression, EngineConfig, MathDefinition, MathEngine, NumericKind, ParameterInfo,
    Tolerance, Value, ValueType,
};
use std::fs;
use std::process;

#[derive(Parser)]
#[command(name = "octofhir-mathexpr")]
#[command(about = "Compile and evaluate mathematical and logical expressions")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// JSON file with a custom syntax definition
    #[arg(short, long, global = true)]
    definition: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Evaluate {
        /// Expression to evaluate
        expression: String,
        /// Parameter value as name=value; repeat for each parameter
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Symmetric tolerance applied to numeric comparisons
        #[arg(short, long)]
        tolerance: Option<f64>,
        /// Print the result as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Print the node tree, parameters and return type of an expression
    Parse {
        /// Expression to parse
        expression: String,
    },
    /// Check that an expression compiles
    Validate {
        /// Expression to validate
        expression: String,
        /// Suppress informational messages
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    let engine = build_engine(cli.definition.as_deref());

    match cli.command {
        Commands::Evaluate {
            expression,
            params,
            tolerance,
            json,
        } => handle_evaluate(&engine, &expression, &params, tolerance, json),
        Commands::Parse { expression } => handle_parse(&engine, &expression),
        Commands::Validate { expression, quiet } => handle_validate(&engine, &expression, quiet),
    }
}

fn build_engine(definition: Option<&str>) -> MathEngine {
    let Some(path) = definition else {
        return MathEngine::new();
    };

    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading definition '{path}': {e}");
        process::exit(1);
    });
    let definition = MathDefinition::from_json(&content).unwrap_or_else(|e| {
        eprintln!("Error in definition '{path}': {e}");
        process::exit(1);
    });
    MathEngine::with_config(EngineConfig {
        definition,
        ..EngineConfig::default()
    })
    .unwrap_or_else(|e| {
        eprintln!("Error creating engine: {e}");
        process::exit(1);
    })
}

fn compile_or_exit(engine: &MathEngine, expression: &str) -> CompiledExpression {
    engine.compile(expression).unwrap_or_else(|e| {
        eprintln!("Error compiling expression: {e}");
        process::exit(1);
    })
}

fn handle_evaluate(
    engine: &MathEngine,
    expression: &str,
    params: &[String],
    tolerance: Option<f64>,
    json: bool,
) {
    let compiled = compile_or_exit(engine, expression);

    let mut values = Vec::with_capacity(compiled.parameters().len());
    for parameter in compiled.parameters() {
        let raw = params.iter().find_map(|param| {
            param
                .split_once('=')
                .filter(|(name, _)| name.trim() == parameter.name)
                .map(|(_, value)| value.trim())
        });
        let Some(raw) = raw else {
            eprintln!("Missing value for parameter {parameter}");
            process::exit(1);
        };
        match parse_value(parameter, raw) {
            Some(value) => values.push(value),
            None => {
                eprintln!("Cannot read '{raw}' as {}", parameter.type_info);
                process::exit(1);
            }
        }
    }

    let result = match tolerance {
        Some(delta) => compiled.evaluate_with_tolerance(&values, &Tolerance::range(delta)),
        None => compiled.evaluate(&values),
    };

    match result {
        Ok(value) if json => println!("{}", value.to_json()),
        Ok(value) => println!("{value}"),
        Err(e) => {
            eprintln!("Error evaluating expression: {e}");
            process::exit(1);
        }
    }
}

fn parse_value(parameter: &ParameterInfo, raw: &str) -> Option<Value> {
    let type_info = parameter.type_info;
    match type_info.value_type {
        ValueType::Boolean => raw.parse::<bool>().ok().map(Value::from),
        ValueType::String => Some(Value::from(raw)),
        ValueType::ByteArray => {
            let digits = raw.strip_prefix("0x").unwrap_or(raw);
            hex::decode(digits).ok().map(Value::from)
        }
        ValueType::Numeric => match type_info.numeric {
            NumericKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            NumericKind::Float => raw.parse::<f64>().ok().map(Value::from),
            NumericKind::Unknown => raw
                .parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| raw.parse::<f64>().ok().map(Value::from)),
        },
    }
}

fn handle_parse(engine: &MathEngine, expression: &str) {
    let compiled = compile_or_exit(engine, expression);
    println!("Tree: {compiled}");
    println!("Return type: {}", compiled.return_type());
    println!("Constant: {}", compiled.is_constant());
    if compiled.parameters().is_empty() {
        println!("Parameters: none");
    } else {
        println!("Parameters:");
        for (position, parameter) in compiled.parameters().iter().enumerate() {
            println!("  {position}: {parameter}");
        }
    }
}

fn handle_validate(engine: &MathEngine, expression: &str, quiet: bool) {
    match engine.compile(expression) {
        Ok(compiled) => {
            if !quiet {
                println!("Valid expression returning {}", compiled.return_type());
            }
        }
        Err(e) => {
            if !quiet {
                eprintln!("Invalid expression: {e}");
            }
            process::exit(1);
        }
    }
}
