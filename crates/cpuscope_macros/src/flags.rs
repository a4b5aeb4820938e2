use proc_macro2::*;
use quote::quote;
use syn::{punctuated::Punctuated, *};

struct FlagArgs {
	list: Punctuated::<Ident, Token![,]>
}

impl syn::parse::Parse for FlagArgs {
	fn parse(input: parse::ParseStream) -> Result<Self> {
		let list = Punctuated::parse_terminated(input)?;
		Ok(Self { list })
	}
}

const BASE_TYPES: [&str; 4] = ["u8", "u16", "u32", "u64"];

/// Value of a single flag, either a known integer or a combination of earlier flags.
enum FlagValue {
	Int(u64),
	Combined(Vec<Ident>),
}

pub fn flags(args: TokenStream, input: TokenStream) -> TokenStream {
	// While we don't exactly are deriving, the `#[flags]` macro is close enough
	let input_parsed = match syn::parse2::<DeriveInput>(input) {
		Ok(derived_input) => derived_input,
		Err(err) => return err.to_compile_error(),
	};

	let vis = input_parsed.vis;
	let flag_name = input_parsed.ident;
	let enum_attrs = input_parsed.attrs;

	let body_data = match input_parsed.data {
		Data::Enum(body) => body,
		_ => return quote!( compile_error!("#[flags] can only be applied to enums"); )
	};

	let args = match parse2::<FlagArgs>(args) {
		Ok(args) => args.list,
		Err(err) => return err.to_compile_error(),
	};
	let mut base_type = None;
	for arg in args {
		if BASE_TYPES.iter().any(|ty| arg == ty) {
			base_type = Some(arg);
		} else {
			let msg = format!("Unknown #[flags] argument '{arg}'");
			return quote!( compile_error!(#msg); );
		}
	}

	let mut idents = Vec::new();
	let mut attrs = Vec::new();
	let mut values = Vec::new();
	let mut next : u64 = 1;
	let mut max_val : u64 = 0;
	for variant in body_data.variants {
		let value = match variant.discriminant {
			None => {
				if next == 0 || !next.is_power_of_two() {
					let msg = format!("Cannot assign an implicit flag value to '{}', the previous value is not a power of 2", variant.ident);
					return quote!( compile_error!(#msg); );
				}
				FlagValue::Int(next)
			},
			Some((_, expr)) => match flag_value_from_expr(&expr) {
				Ok(value) => value,
				Err(err) => return err,
			},
		};

		if let FlagValue::Int(int) = value {
			max_val = max_val.max(int);
			next = int.checked_shl(1).unwrap_or(0);
		}

		idents.push(variant.ident);
		attrs.push(variant.attrs);
		values.push(value);
	}

	let base_type = base_type.unwrap_or_else(|| {
		let name = if max_val <= u8::MAX as u64 {
			"u8"
		} else if max_val <= u16::MAX as u64 {
			"u16"
		} else if max_val <= u32::MAX as u64 {
			"u32"
		} else {
			"u64"
		};
		Ident::new(name, Span::call_site())
	});

	let consts = values.iter().map(|value| match value {
		FlagValue::Int(int) => {
			let lit = LitInt::new(&format!("{int}{base_type}"), Span::call_site());
			quote!(Self { bits: #lit })
		},
		FlagValue::Combined(parts) => quote!(Self { bits: 0 #( | Self::#parts.bits)* }),
	});

	quote!(
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
		#(#enum_attrs)*
		#[repr(transparent)]
		#vis struct #flag_name {
			bits : #base_type
		}

		#[allow(non_upper_case_globals)]
		impl #flag_name {
			#(#(#attrs)* #vis const #idents : #flag_name = #consts;)*

			/// Names of all flags, in declaration order
			const NAMED: &'static [(&'static str, #flag_name)] = &[#((stringify!(#idents), #flag_name::#idents),)*];

			/// Create flags instance with no flag set.
			#vis const fn none() -> Self {
				Self { bits: 0 }
			}

			/// Create flags instance with all valid flags set.
			#vis const fn all() -> Self {
				Self { bits: 0 #( | #flag_name::#idents.bits)* }
			}

			/// Create flags from raw bits, dropping bits that don't correspond to a flag.
			#vis const fn from_bits_truncate(bits: #base_type) -> Self {
				Self { bits: bits & Self::all().bits }
			}

			/// Get the flags' bits
			#vis const fn bits(&self) -> #base_type {
				self.bits
			}

			/// Check if a given flag(s) is/are set (if multiple flags are checked, all flags need to be set).
			#vis const fn contains(&self, flag: #flag_name) -> bool {
				self.bits & flag.bits == flag.bits
			}

			/// Check if any of the given flags are set.
			#vis const fn intersects(&self, flag: #flag_name) -> bool {
				self.bits & flag.bits != 0
			}

			/// Check if no flag is set.
			#vis const fn is_none(&self) -> bool {
				self.bits == 0
			}

			/// Check if any flag is set.
			#vis const fn is_any(&self) -> bool {
				self.bits != 0
			}

			/// Set the state of a given flag to `set`.
			#vis fn set(&mut self, flag: #flag_name, set: bool) {
				if set {
					self.bits |= flag.bits;
				} else {
					self.bits &= !flag.bits;
				}
			}

			/// Enable a given flag.
			#vis fn enable(&mut self, flag: #flag_name) {
				self.bits |= flag.bits;
			}

			/// Disable a given flag.
			#vis fn disable(&mut self, flag: #flag_name) {
				self.bits &= !flag.bits;
			}
		}

		impl ::core::ops::Not for #flag_name {
			type Output = Self;
			fn not(self) -> Self {
				Self { bits: !self.bits }
			}
		}

		impl ::core::ops::BitAnd for #flag_name {
			type Output = Self;
			fn bitand(self, rhs: Self) -> Self {
				Self { bits: self.bits & rhs.bits }
			}
		}

		impl ::core::ops::BitAndAssign for #flag_name {
			fn bitand_assign(&mut self, rhs: Self) {
				self.bits &= rhs.bits;
			}
		}

		impl ::core::ops::BitOr for #flag_name {
			type Output = Self;
			fn bitor(self, rhs: Self) -> Self {
				Self { bits: self.bits | rhs.bits }
			}
		}

		impl ::core::ops::BitOrAssign for #flag_name {
			fn bitor_assign(&mut self, rhs: Self) {
				self.bits |= rhs.bits;
			}
		}

		impl From<#flag_name> for #base_type {
			fn from(val: #flag_name) -> #base_type {
				val.bits
			}
		}

		impl Default for #flag_name {
			fn default() -> #flag_name {
				#flag_name::none()
			}
		}

		impl ::core::fmt::Debug for #flag_name {
			fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
				if self.is_none() {
					return f.write_str("None");
				}

				let mut remaining = *self;
				let mut started = false;
				for (name, flag) in Self::NAMED {
					if flag.is_any() && self.contains(*flag) && remaining.intersects(*flag) {
						if started {
							f.write_str(" | ")?;
						}
						f.write_str(name)?;
						remaining.disable(*flag);
						started = true;
					}
				}

				if remaining.is_any() {
					if started {
						f.write_str(" | ")?;
					}
					write!(f, "{:#x}", remaining.bits)?;
				}
				Ok(())
			}
		}

		impl ::core::fmt::Display for #flag_name {
			fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
				::core::fmt::Debug::fmt(self, f)
			}
		}
	)
}

fn flag_value_from_expr(expr: &Expr) -> core::result::Result<FlagValue, TokenStream> {
	match expr {
		Expr::Lit(ExprLit { lit: Lit::Int(int), .. }) => match int.base10_parse::<u64>() {
			Ok(val) => Ok(FlagValue::Int(val)),
			Err(err) => Err(err.to_compile_error()),
		},
		Expr::Path(_) | Expr::Binary(_) => {
			let mut parts = Vec::new();
			collect_ored_paths(expr, &mut parts)?;
			Ok(FlagValue::Combined(parts))
		},
		_ => Err(quote!( compile_error!("Only integer literals or `|`-combinations of other flags are supported"); )),
	}
}

fn collect_ored_paths(expr: &Expr, parts: &mut Vec<Ident>) -> core::result::Result<(), TokenStream> {
	match expr {
		Expr::Path(path) => match path.path.get_ident() {
			Some(ident) => {
				parts.push(ident.clone());
				Ok(())
			},
			None => Err(quote!( compile_error!("Only single identifiers are allowed"); )),
		},
		Expr::Binary(ExprBinary { left, right, op: BinOp::BitOr(_), .. }) => {
			collect_ored_paths(left, parts)?;
			collect_ored_paths(right, parts)
		},
		_ => Err(quote!( compile_error!("Unsupported expression component"); )),
	}
}
